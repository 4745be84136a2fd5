//! Actor-protocol façade for the Lumen debug adapter.
//!
//! The browser runtime exposes debuggable units (threads, tabs, workers) and
//! loaded sources as remote *actors*: independently addressable objects with
//! an opaque name and a fixed RPC-like method set. This crate defines the
//! typed proxies the adapter core consumes, the tagged event decode at the
//! protocol boundary, the error taxonomy, and deterministic in-memory mock
//! actors for tests.
//!
//! Transport framing and connection lifecycle live below this crate; the
//! reconciliation core only ever sees the traits defined here.

mod actors;
mod events;
pub mod mock;

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use actors::{BreakpointActor, SetBreakpointReply, SourceActor, ThreadActor};
pub use events::{NavigationState, PausedReason, RdpEvent};

/// Opaque remote actor identifier, e.g. `server1.conn0.child1/source27`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorName(pub String);

impl ActorName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing decimal digits of the actor name.
    ///
    /// Used when synthesizing a display name for sources that have no URL:
    /// the runtime's actor names end in a per-connection counter, which is
    /// the only stable human-readable handle such sources carry.
    pub fn trailing_digits(&self) -> &str {
        let s = self.0.as_str();
        let digits = s.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        &s[s.len() - digits..]
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ActorName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A source position as the runtime counts it: 1-based line, 0-based column.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Descriptive metadata the runtime attaches to a source actor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Human label for how the source came to exist (`eval`, `scriptElement`,
    /// `debugger eval`, ...).
    pub introduction_type: Option<String>,
    /// Whether the runtime deemphasizes this source (blackboxing).
    pub is_black_boxed: bool,
}

#[derive(Debug, Error)]
pub enum RdpError {
    /// The remote actor no longer exists (disposed, navigated away).
    #[error("actor {0} is gone")]
    ActorGone(ActorName),

    /// The remote rejected the operation. Per-operation and recoverable.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RdpError>;
