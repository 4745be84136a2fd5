use lumen_rdp::{ActorName, RdpError};
use thiserror::Error;

pub type DebugResult<T> = Result<T, DebugError>;

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("rdp: {0}")]
    Rdp(#[from] RdpError),

    /// The runtime reported no breakpoint-settable positions for a source
    /// even though the protocol guarantees at least one for loaded scripts.
    /// Fatal for that source's adapter, not for the session.
    #[error("source {actor} reported no valid breakpoint positions")]
    NoValidPositions { actor: ActorName },
}
