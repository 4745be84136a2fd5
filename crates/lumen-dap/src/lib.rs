//! Breakpoint and source reconciliation core for the Lumen debug adapter.
//!
//! Lumen bridges an editor's Debug Adapter Protocol to a browser runtime
//! whose debugging protocol is actor-based: threads, tabs, workers and
//! loaded sources are independently addressable remote actors with their own
//! lifecycles. This crate keeps the editor's *desired* breakpoint set, the
//! runtime's *actual* set of installed breakpoint actors, and the thread's
//! execution-pause state consistent with each other.
//!
//! The centerpiece is [`SourceAdapter`]: a continuously re-entered
//! reconciliation loop that converges one source's installed breakpoints to
//! the most recently submitted desired set via minimal delete/add batches,
//! across two incompatible wire variants ([`ProtocolVariant`]). The legacy
//! variant can only mutate breakpoints on a paused thread, which the
//! [`PauseCoordinator`] arranges.

pub mod breakpoints;
pub mod error;
pub mod pause;
pub mod registry;
pub mod source;
pub mod strategy;
pub mod thread;
pub mod verify;

pub use crate::breakpoints::{
    find_next_valid_position, log_message_to_expression, BreakpointDescriptor, BreakpointRequest,
    EquivalenceKey, InstalledBreakpoint, InstalledHandle,
};
pub use crate::error::{DebugError, DebugResult};
pub use crate::pause::{PauseCoordinator, PauseState};
pub use crate::registry::IdRegistry;
pub use crate::source::{SourceAdapter, SourceDescriptor};
pub use crate::strategy::{InstallStrategy, ProtocolVariant};
pub use crate::thread::ThreadAdapter;
pub use crate::verify::{VerificationReporter, VerifySink};
