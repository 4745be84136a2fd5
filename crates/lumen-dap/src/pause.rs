use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use lumen_rdp::{RdpError, ThreadActor};
use parking_lot::Mutex;

/// Execution-pause state of the debuggee thread as this session tracks it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseState {
    Running,
    Pausing,
    Paused,
    Resuming,
}

/// Serializes operations that must run while the debuggee thread is paused.
///
/// The legacy breakpoint variant cannot safely mutate breakpoints on a
/// running thread, so such work funnels through [`run_on_paused`]: the
/// coordinator interrupts the thread when it is running, runs queued actions
/// one at a time, and resumes only once the queue has drained, and only if
/// the pause was its own. A stop the runtime initiated (breakpoint hit, user
/// interrupt) is reused as-is and never resumed from here.
///
/// [`run_on_paused`]: PauseCoordinator::run_on_paused
pub struct PauseCoordinator {
    thread: Arc<dyn ThreadActor>,
    state: Mutex<PauseState>,
    queue: tokio::sync::Mutex<()>,
    waiters: AtomicUsize,
    paused_here: AtomicBool,
}

impl PauseCoordinator {
    pub fn new(thread: Arc<dyn ThreadActor>) -> Self {
        Self {
            thread,
            state: Mutex::new(PauseState::Running),
            queue: tokio::sync::Mutex::new(()),
            waiters: AtomicUsize::new(0),
            paused_here: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PauseState {
        *self.state.lock()
    }

    /// Runtime-initiated pause (breakpoint hit, debugger statement, user
    /// interrupt).
    pub fn notify_paused(&self) {
        *self.state.lock() = PauseState::Paused;
    }

    /// Runtime-initiated resume.
    pub fn notify_resumed(&self) {
        *self.state.lock() = PauseState::Running;
    }

    /// Run `action` while the thread is paused.
    ///
    /// Concurrent callers serialize; any burst of callers on a running
    /// thread costs exactly one interrupt/resume pair, and the thread
    /// resumes only after the last queued action has finished. Errs only
    /// when the thread could not be paused (the action never ran); a failed
    /// resume keeps the action's result and is retried by the next burst.
    pub async fn run_on_paused<F, Fut, T>(&self, action: F) -> Result<T, RdpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // Registered before taking the queue lock, so the caller currently
        // draining the queue sees us and keeps the thread paused.
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let _guard = self.queue.lock().await;

        let pause_needed = {
            let mut state = self.state.lock();
            if *state == PauseState::Running {
                *state = PauseState::Pausing;
                true
            } else {
                false
            }
        };

        if pause_needed {
            if let Err(err) = self.thread.interrupt().await {
                *self.state.lock() = PauseState::Running;
                self.waiters.fetch_sub(1, Ordering::SeqCst);
                return Err(err);
            }
            *self.state.lock() = PauseState::Paused;
            self.paused_here.store(true, Ordering::SeqCst);
        }

        let out = action().await;

        let remaining = self.waiters.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.paused_here.swap(false, Ordering::SeqCst) {
            *self.state.lock() = PauseState::Resuming;
            match self.thread.resume().await {
                Ok(()) => *self.state.lock() = PauseState::Running,
                Err(err) => {
                    // Still paused as far as we know; the next burst finds
                    // the thread stopped, skips the interrupt and retries
                    // the resume. The action already ran, so its result is
                    // kept.
                    *self.state.lock() = PauseState::Paused;
                    self.paused_here.store(true, Ordering::SeqCst);
                    tracing::warn!(%err, "failed to resume thread after paused work");
                }
            }
        }

        Ok(out)
    }
}
