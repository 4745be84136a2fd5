use std::collections::HashMap;
use std::sync::Arc;

use lumen_rdp::Position;
use parking_lot::Mutex;

use crate::breakpoints::{BreakpointDescriptor, EquivalenceKey};

/// Editor-facing breakpoint verification sink.
///
/// One-way notification that a breakpoint is confirmed at an actual
/// position. Implementations must tolerate duplicate calls with identical
/// arguments; the reporter suppresses the obvious repeats but the contract
/// stays idempotent-safe.
pub trait VerifySink: Send + Sync {
    fn verify_breakpoint(&self, descriptor: &BreakpointDescriptor, actual: Position);
}

/// Deduplicates verification events per descriptor equivalence key.
///
/// Re-verifying an unchanged actual position is suppressed to avoid
/// redundant editor updates; a re-install after deletion, or a move to a
/// different actual position, notifies again.
pub struct VerificationReporter {
    sink: Arc<dyn VerifySink>,
    reported: Mutex<HashMap<EquivalenceKey, Position>>,
}

impl VerificationReporter {
    pub fn new(sink: Arc<dyn VerifySink>) -> Self {
        Self {
            sink,
            reported: Mutex::new(HashMap::new()),
        }
    }

    pub fn report(&self, descriptor: &BreakpointDescriptor, actual: Position) {
        {
            let mut reported = self.reported.lock();
            if reported.insert(descriptor.key(), actual) == Some(actual) {
                return;
            }
        }
        self.sink.verify_breakpoint(descriptor, actual);
    }

    /// Forget a descriptor once its installed breakpoint is deleted, so a
    /// later re-install notifies the editor again.
    pub fn forget(&self, key: &EquivalenceKey) {
        self.reported.lock().remove(key);
    }
}
