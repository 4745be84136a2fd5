//! Deterministic, in-memory actor doubles for reconciliation tests.
//!
//! All actors of one mock session share a single [`CallLog`] so cross-actor
//! ordering (delete-before-add, interrupt-before-install) is observable.
//! [`Gate`] lets a test hold remote operations open and release them at a
//! chosen moment, which is how single-flight and pause-gating behavior is
//! pinned down without sleeping.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::{
    ActorName, BreakpointActor, Position, RdpError, Result, SetBreakpointReply, SourceActor,
    SourceMetadata, ThreadActor,
};

/// One remote call as recorded by the mock actors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    BreakpointPositions {
        source: ActorName,
    },
    SetBreakpointLegacy {
        source: ActorName,
        position: Position,
        condition: Option<String>,
    },
    DeleteBreakpoint {
        actor: ActorName,
    },
    SetBreakpointModern {
        position: Position,
        source_url: String,
        condition: Option<String>,
        log_value: Option<String>,
    },
    RemoveBreakpointModern {
        position: Position,
        source_url: String,
    },
    Interrupt,
    Resume,
    DisposeSource {
        source: ActorName,
    },
}

/// Ordered record of every remote call made against a mock session.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Drain the log, returning everything recorded so far.
    pub fn take(&self) -> Vec<MockCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

/// Awaitable barrier holding mock remote operations open until released.
///
/// The default gate is open (operations complete immediately). A closed gate
/// makes each gated operation await one permit from [`Gate::release`].
#[derive(Clone, Default)]
pub struct Gate {
    sem: Option<Arc<Semaphore>>,
}

impl Gate {
    pub fn open() -> Self {
        Self { sem: None }
    }

    pub fn closed() -> Self {
        Self {
            sem: Some(Arc::new(Semaphore::new(0))),
        }
    }

    /// Let `n` gated operations through.
    pub fn release(&self, n: usize) {
        if let Some(sem) = &self.sem {
            sem.add_permits(n);
        }
    }

    async fn pass(&self) {
        if let Some(sem) = &self.sem {
            let permit = sem.acquire().await.expect("gate semaphore closed");
            permit.forget();
        }
    }
}

pub struct MockSourceActor {
    name: ActorName,
    url: Option<String>,
    metadata: SourceMetadata,
    positions: Vec<Position>,
    report_actual: bool,
    fail_set_at: Mutex<HashSet<Position>>,
    fail_next_positions: AtomicBool,
    log: CallLog,
    gate: Gate,
    next_breakpoint: AtomicU64,
}

impl MockSourceActor {
    pub fn new(name: impl Into<ActorName>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            url: None,
            metadata: SourceMetadata::default(),
            positions: Vec::new(),
            report_actual: true,
            fail_set_at: Mutex::new(HashSet::new()),
            fail_next_positions: AtomicBool::new(false),
            log,
            gate: Gate::open(),
            next_breakpoint: AtomicU64::new(1),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Valid breakpoint positions this source reports.
    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions = positions;
        self
    }

    /// Hold legacy installs open until the gate is released.
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    /// Legacy installs stop reporting an actual position, exercising the
    /// requested-position fallback.
    pub fn without_actual_positions(mut self) -> Self {
        self.report_actual = false;
        self
    }

    /// Make legacy installs at `position` fail with a protocol error.
    pub fn fail_set_at(&self, position: Position) {
        self.fail_set_at.lock().insert(position);
    }

    /// Make the next position query fail with a protocol error.
    pub fn fail_next_positions(&self) {
        self.fail_next_positions.store(true, Ordering::SeqCst);
    }

    fn resolve(&self, requested: Position) -> Position {
        let mut sorted = self.positions.clone();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .find(|p| *p >= requested)
            .unwrap_or(requested)
    }
}

#[async_trait]
impl SourceActor for MockSourceActor {
    fn name(&self) -> &ActorName {
        &self.name
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn breakpoint_positions(&self) -> Result<Vec<Position>> {
        self.log.push(MockCall::BreakpointPositions {
            source: self.name.clone(),
        });
        if self.fail_next_positions.swap(false, Ordering::SeqCst) {
            return Err(RdpError::Protocol("source is not ready".to_string()));
        }
        Ok(self.positions.clone())
    }

    async fn set_breakpoint(
        &self,
        position: Position,
        condition: Option<&str>,
    ) -> Result<SetBreakpointReply> {
        self.gate.pass().await;
        self.log.push(MockCall::SetBreakpointLegacy {
            source: self.name.clone(),
            position,
            condition: condition.map(str::to_string),
        });

        if self.fail_set_at.lock().contains(&position) {
            return Err(RdpError::Protocol(format!(
                "noScript: no breakable code at {position}"
            )));
        }

        let n = self.next_breakpoint.fetch_add(1, Ordering::SeqCst);
        let actor = Arc::new(MockBreakpointActor {
            name: ActorName(format!("{}/breakpoint{n}", self.name)),
            log: self.log.clone(),
        });

        Ok(SetBreakpointReply {
            actual: self.report_actual.then(|| self.resolve(position)),
            actor,
        })
    }

    async fn dispose(&self) -> Result<()> {
        self.log.push(MockCall::DisposeSource {
            source: self.name.clone(),
        });
        Ok(())
    }
}

pub struct MockBreakpointActor {
    name: ActorName,
    log: CallLog,
}

#[async_trait]
impl BreakpointActor for MockBreakpointActor {
    fn name(&self) -> &ActorName {
        &self.name
    }

    async fn delete(&self) -> Result<()> {
        self.log.push(MockCall::DeleteBreakpoint {
            actor: self.name.clone(),
        });
        Ok(())
    }
}

pub struct MockThreadActor {
    name: ActorName,
    fail_set_at: Mutex<HashSet<Position>>,
    fail_next_interrupt: AtomicBool,
    fail_next_resume: AtomicBool,
    log: CallLog,
    gate: Gate,
}

impl MockThreadActor {
    pub fn new(name: impl Into<ActorName>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            fail_set_at: Mutex::new(HashSet::new()),
            fail_next_interrupt: AtomicBool::new(false),
            fail_next_resume: AtomicBool::new(false),
            log,
            gate: Gate::open(),
        }
    }

    /// Hold modern installs open until the gate is released.
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    /// Make modern installs at `position` fail with a protocol error.
    pub fn fail_set_at(&self, position: Position) {
        self.fail_set_at.lock().insert(position);
    }

    /// Make the next interrupt fail with a protocol error.
    pub fn fail_next_interrupt(&self) {
        self.fail_next_interrupt.store(true, Ordering::SeqCst);
    }

    /// Make the next resume fail with a protocol error.
    pub fn fail_next_resume(&self) {
        self.fail_next_resume.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ThreadActor for MockThreadActor {
    fn name(&self) -> &ActorName {
        &self.name
    }

    async fn set_breakpoint(
        &self,
        position: Position,
        source_url: &str,
        condition: Option<&str>,
        log_value: Option<&str>,
    ) -> Result<()> {
        self.gate.pass().await;
        self.log.push(MockCall::SetBreakpointModern {
            position,
            source_url: source_url.to_string(),
            condition: condition.map(str::to_string),
            log_value: log_value.map(str::to_string),
        });

        if self.fail_set_at.lock().contains(&position) {
            return Err(RdpError::Protocol(format!("invalid position {position}")));
        }
        Ok(())
    }

    async fn remove_breakpoint(&self, position: Position, source_url: &str) -> Result<()> {
        self.log.push(MockCall::RemoveBreakpointModern {
            position,
            source_url: source_url.to_string(),
        });
        Ok(())
    }

    async fn interrupt(&self) -> Result<()> {
        self.log.push(MockCall::Interrupt);
        if self.fail_next_interrupt.swap(false, Ordering::SeqCst) {
            return Err(RdpError::Protocol("wrongState: cannot interrupt".to_string()));
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.log.push(MockCall::Resume);
        if self.fail_next_resume.swap(false, Ordering::SeqCst) {
            return Err(RdpError::Protocol("wrongState: cannot resume".to_string()));
        }
        Ok(())
    }
}
