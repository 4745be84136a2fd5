use std::collections::HashMap;
use std::sync::Arc;

use lumen_rdp::{ActorName, NavigationState, RdpEvent, SourceActor, ThreadActor};
use parking_lot::Mutex;

use crate::breakpoints::{BreakpointDescriptor, BreakpointRequest};
use crate::pause::PauseCoordinator;
use crate::registry::IdRegistry;
use crate::source::SourceAdapter;
use crate::strategy::{InstallStrategy, ProtocolVariant};
use crate::verify::{VerificationReporter, VerifySink};

/// Owns the source adapters of one debuggable unit (tab thread, worker).
///
/// Routes desired-breakpoint updates to the matching source, funnels
/// pause-requiring work through the unit's single [`PauseCoordinator`], and
/// feeds runtime events into the session's bookkeeping.
pub struct ThreadAdapter {
    session_id: String,
    strategy: Arc<InstallStrategy>,
    pause: Arc<PauseCoordinator>,
    reporter: Arc<VerificationReporter>,
    registry: Mutex<IdRegistry<ActorName>>,
    sources: Mutex<HashMap<u32, Arc<SourceAdapter>>>,
}

impl ThreadAdapter {
    /// The wire variant is fixed once per session at startup.
    pub fn new(
        thread: Arc<dyn ThreadActor>,
        variant: ProtocolVariant,
        sink: Arc<dyn VerifySink>,
        session_id: impl Into<String>,
    ) -> Self {
        let pause = Arc::new(PauseCoordinator::new(Arc::clone(&thread)));
        let strategy = Arc::new(match variant {
            ProtocolVariant::Modern => InstallStrategy::Modern { thread },
            ProtocolVariant::Legacy => InstallStrategy::Legacy {
                pause: Arc::clone(&pause),
            },
        });

        Self {
            session_id: session_id.into(),
            strategy,
            pause,
            reporter: Arc::new(VerificationReporter::new(sink)),
            registry: Mutex::new(IdRegistry::new()),
            sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn pause(&self) -> &Arc<PauseCoordinator> {
        &self.pause
    }

    /// Register a newly loaded source and build its adapter.
    ///
    /// Idempotent: re-delivery of an already-known actor returns the
    /// existing adapter (ids are assigned exactly once per actor).
    pub fn source_added(&self, actor: Arc<dyn SourceActor>) -> Arc<SourceAdapter> {
        let id = {
            let mut registry = self.registry.lock();
            match registry.id_of(actor.name()) {
                Some(id) => id,
                None => registry.register(actor.name().clone()),
            }
        };

        let mut sources = self.sources.lock();
        Arc::clone(sources.entry(id).or_insert_with(|| {
            SourceAdapter::new(
                id,
                self.session_id.clone(),
                actor,
                Arc::clone(&self.strategy),
                Arc::clone(&self.reporter),
            )
        }))
    }

    /// Teardown for a single source the runtime reported as removed.
    pub async fn source_removed(&self, name: &ActorName) {
        let adapter = {
            let mut sources = self.sources.lock();
            let id = sources
                .iter()
                .find(|(_, adapter)| adapter.source().name() == name)
                .map(|(id, _)| *id);
            id.and_then(|id| sources.remove(&id))
        };

        match adapter {
            Some(adapter) => adapter.dispose().await,
            None => tracing::debug!(actor = %name, "removal of unknown source ignored"),
        }
    }

    /// Route a desired breakpoint set to its source.
    ///
    /// An unknown source id is a stale request (the editor can race ahead
    /// of the runtime's teardown notifications), so it is logged, not an
    /// error.
    pub fn update_breakpoints(&self, source_id: u32, desired: Vec<BreakpointRequest>) {
        let adapter = self.sources.lock().get(&source_id).cloned();
        match adapter {
            Some(adapter) => adapter.submit_desired(desired),
            None => {
                tracing::debug!(source_id, "breakpoints for unknown source discarded");
            }
        }
    }

    /// Feed one runtime event through the session's bookkeeping.
    ///
    /// Source actors are materialized by the transport layer, which follows
    /// a `NewSource` event with [`ThreadAdapter::source_added`]; here the
    /// event only adjusts pause state and the source set. For a pause at a
    /// breakpoint, returns the descriptor the pause maps back to.
    pub fn handle_event(&self, event: &RdpEvent) -> Option<BreakpointDescriptor> {
        match event {
            RdpEvent::NewSource { actor, .. } => {
                tracing::trace!(%actor, "new source announced");
                None
            }
            RdpEvent::TabNavigated { state } => {
                if *state == NavigationState::Start {
                    // Navigation discards the runtime's sources and their
                    // breakpoint actors; only local bookkeeping remains.
                    let dropped = {
                        let mut sources = self.sources.lock();
                        let count = sources.len();
                        sources.clear();
                        count
                    };
                    tracing::debug!(dropped, "navigation dropped sources");
                }
                None
            }
            RdpEvent::Paused { why } => {
                self.pause.notify_paused();
                why.actors
                    .iter()
                    .find_map(|name| self.find_breakpoint_by_actor(name))
            }
            RdpEvent::Resumed => {
                self.pause.notify_resumed();
                None
            }
            RdpEvent::Unknown => {
                tracing::trace!("unhandled runtime event");
                None
            }
        }
    }

    pub fn find_breakpoint_by_actor(&self, name: &ActorName) -> Option<BreakpointDescriptor> {
        self.sources
            .lock()
            .values()
            .find_map(|adapter| adapter.find_installed_by_actor(name))
    }

    pub fn find_source_by_url(&self, url: &str) -> Option<Arc<SourceAdapter>> {
        self.sources
            .lock()
            .values()
            .find(|adapter| adapter.source().url() == Some(url))
            .cloned()
    }

    /// All owned source adapters, ordered by id.
    pub fn sources(&self) -> Vec<Arc<SourceAdapter>> {
        let mut sources: Vec<_> = self.sources.lock().values().cloned().collect();
        sources.sort_by_key(|adapter| adapter.id());
        sources
    }

    /// Await quiescence of every owned source's reconciliation.
    pub async fn wait_idle(&self) {
        for adapter in self.sources() {
            adapter.wait_idle().await;
        }
    }

    /// Session termination: dispose every owned source adapter.
    pub async fn dispose(&self) {
        let sources: Vec<_> = self.sources.lock().drain().map(|(_, a)| a).collect();
        for adapter in sources {
            adapter.dispose().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_rdp::mock::{CallLog, MockSourceActor, MockThreadActor};
    use lumen_rdp::Position;

    struct NullSink;

    impl VerifySink for NullSink {
        fn verify_breakpoint(&self, _: &BreakpointDescriptor, _: Position) {}
    }

    fn thread_adapter(log: &CallLog) -> ThreadAdapter {
        let thread = Arc::new(MockThreadActor::new("server1.conn0/thread1", log.clone()));
        ThreadAdapter::new(thread, ProtocolVariant::Modern, Arc::new(NullSink), "session1")
    }

    #[tokio::test]
    async fn breakpoints_for_unknown_source_are_discarded() {
        let log = CallLog::new();
        let adapter = thread_adapter(&log);

        adapter.update_breakpoints(99, vec![BreakpointRequest::at_line(5)]);
        adapter.wait_idle().await;

        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn re_announced_source_keeps_its_id() {
        let log = CallLog::new();
        let adapter = thread_adapter(&log);

        let actor = Arc::new(
            MockSourceActor::new("server1.conn0/source9", log.clone())
                .with_url("https://example.com/a.js"),
        );
        let first = adapter.source_added(Arc::clone(&actor) as Arc<dyn SourceActor>);
        let second = adapter.source_added(actor);

        assert_eq!(first.id(), second.id());
        assert_eq!(adapter.sources().len(), 1);
    }

    #[tokio::test]
    async fn navigation_drops_sources_without_remote_calls() {
        let log = CallLog::new();
        let adapter = thread_adapter(&log);
        adapter.source_added(Arc::new(
            MockSourceActor::new("server1.conn0/source1", log.clone()),
        ));

        let event: RdpEvent =
            serde_json::from_str(r#"{"type": "tabNavigated", "state": "start"}"#).unwrap();
        assert_eq!(adapter.handle_event(&event), None);

        assert!(adapter.sources().is_empty());
        assert!(log.calls().is_empty());
    }
}
