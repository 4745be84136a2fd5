use std::sync::Arc;

use async_trait::async_trait;

use crate::{ActorName, Position, Result, SourceMetadata};

/// Result of a legacy-variant install on a source actor.
///
/// Actor protocols introduce new actors through replies: a successful
/// install hands back a dedicated breakpoint actor, which is also the only
/// handle through which the breakpoint can later be deleted.
#[derive(Clone)]
pub struct SetBreakpointReply {
    /// Position the runtime actually installed at, when it reports one.
    pub actual: Option<Position>,
    pub actor: Arc<dyn BreakpointActor>,
}

/// Proxy for one loaded source unit.
///
/// `set_breakpoint` is the legacy install path: the runtime owns position
/// resolution and replies with a dedicated breakpoint actor. Runtimes that
/// speak the modern variant install through [`ThreadActor::set_breakpoint`]
/// instead, and use this actor only for position queries and disposal.
#[async_trait]
pub trait SourceActor: Send + Sync {
    fn name(&self) -> &ActorName;
    fn url(&self) -> Option<&str>;
    fn metadata(&self) -> &SourceMetadata;

    /// Valid breakpoint-settable positions in this source.
    async fn breakpoint_positions(&self) -> Result<Vec<Position>>;

    /// Legacy install. Only safe while the owning thread is paused.
    async fn set_breakpoint(
        &self,
        position: Position,
        condition: Option<&str>,
    ) -> Result<SetBreakpointReply>;

    /// Release the remote handle. The runtime discards the source's
    /// breakpoints along with the source itself.
    async fn dispose(&self) -> Result<()>;
}

/// Proxy for a breakpoint actor created by a legacy-variant install.
#[async_trait]
pub trait BreakpointActor: Send + Sync {
    fn name(&self) -> &ActorName;
    async fn delete(&self) -> Result<()>;
}

/// Proxy for one debuggable unit (tab thread, worker).
#[async_trait]
pub trait ThreadActor: Send + Sync {
    fn name(&self) -> &ActorName;

    /// Modern install: positions are resolved client-side first; the runtime
    /// rejects an invalid position with a protocol error.
    async fn set_breakpoint(
        &self,
        position: Position,
        source_url: &str,
        condition: Option<&str>,
        log_value: Option<&str>,
    ) -> Result<()>;

    /// Modern removal, keyed by the installed position.
    async fn remove_breakpoint(&self, position: Position, source_url: &str) -> Result<()>;

    async fn interrupt(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
}
