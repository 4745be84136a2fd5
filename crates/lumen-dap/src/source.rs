use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lumen_rdp::{ActorName, Position, SourceActor};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::breakpoints::{BreakpointDescriptor, BreakpointRequest, InstalledBreakpoint};
use crate::error::DebugResult;
use crate::strategy::InstallStrategy;
use crate::verify::VerificationReporter;

/// Editor-visible description of one source unit.
///
/// Carries either a local filesystem path (the editor opens it directly) or
/// a synthetic reference the editor uses to retrieve the source text on
/// demand from the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_hint: Option<&'static str>,
}

struct SourceState {
    installed: Vec<InstalledBreakpoint>,
    pending: Option<Vec<BreakpointRequest>>,
    in_flight: bool,
}

/// Reconciles one source's breakpoints between editor intent and runtime
/// reality.
///
/// The editor's latest desired set sits in a single pending slot; at most
/// one reconciliation run per source is in flight at any time. A submission
/// during a run replaces the slot and is picked up when the run completes;
/// older desired sets are superseded, never merged. Within a run, every
/// deletion completes before any addition starts, so a changed condition or
/// log message on an equivalent-by-position breakpoint can never survive as
/// a stale actor.
pub struct SourceAdapter {
    id: u32,
    session_id: String,
    source: Arc<dyn SourceActor>,
    strategy: Arc<InstallStrategy>,
    reporter: Arc<VerificationReporter>,
    state: Mutex<SourceState>,
    idle: watch::Sender<()>,
    defunct: AtomicBool,
}

impl SourceAdapter {
    pub fn new(
        id: u32,
        session_id: impl Into<String>,
        source: Arc<dyn SourceActor>,
        strategy: Arc<InstallStrategy>,
        reporter: Arc<VerificationReporter>,
    ) -> Arc<Self> {
        let (idle, _) = watch::channel(());
        Arc::new(Self {
            id,
            session_id: session_id.into(),
            source,
            strategy,
            reporter,
            state: Mutex::new(SourceState {
                installed: Vec::new(),
                pending: None,
                in_flight: false,
            }),
            idle,
            defunct: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn source(&self) -> &Arc<dyn SourceActor> {
        &self.source
    }

    /// Replace the pending desired set and kick off reconciliation.
    ///
    /// Returns immediately. If a run is already in flight, the new set
    /// becomes the one that run's drain loop processes next.
    pub fn submit_desired(self: &Arc<Self>, desired: Vec<BreakpointRequest>) {
        if self.defunct.load(Ordering::SeqCst) {
            tracing::debug!(
                source = %self.source.name(),
                "breakpoints for retired source discarded"
            );
            return;
        }

        let start_drain = {
            let mut state = self.state.lock();
            state.pending = Some(desired);
            if state.in_flight {
                false
            } else {
                state.in_flight = true;
                true
            }
        };

        if start_drain {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.drain().await });
        }
    }

    /// Await until no run is in flight and no desired set is pending.
    pub async fn wait_idle(&self) {
        let mut rx = self.idle.subscribe();
        loop {
            {
                let state = self.state.lock();
                if !state.in_flight && state.pending.is_none() {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn find_installed_by_actor(&self, name: &ActorName) -> Option<BreakpointDescriptor> {
        self.state
            .lock()
            .installed
            .iter()
            .find(|bp| bp.actor_name() == Some(name))
            .map(|bp| bp.descriptor.clone())
    }

    pub fn find_installed_by_position(&self, position: Position) -> Option<BreakpointDescriptor> {
        self.state
            .lock()
            .installed
            .iter()
            .find(|bp| bp.descriptor.actual == Some(position))
            .map(|bp| bp.descriptor.clone())
    }

    /// Snapshot of the currently-installed descriptors.
    pub fn installed_descriptors(&self) -> Vec<BreakpointDescriptor> {
        self.state
            .lock()
            .installed
            .iter()
            .map(|bp| bp.descriptor.clone())
            .collect()
    }

    /// Release the remote source handle. Installed breakpoints are not
    /// deleted individually; the runtime discards them with the source.
    pub async fn dispose(&self) {
        self.defunct.store(true, Ordering::SeqCst);
        if let Err(err) = self.source.dispose().await {
            tracing::debug!(source = %self.source.name(), %err, "source dispose failed");
        }
    }

    /// Explicit queue-of-depth-one scheduler: each iteration consumes
    /// exactly one pending set, and the in-flight flag only clears once the
    /// slot is empty.
    async fn drain(self: Arc<Self>) {
        loop {
            let desired = {
                let mut state = self.state.lock();
                match state.pending.take() {
                    Some(desired) => desired,
                    None => {
                        state.in_flight = false;
                        drop(state);
                        let _ = self.idle.send(());
                        return;
                    }
                }
            };

            if let Err(err) = self.reconcile(desired).await {
                tracing::error!(
                    source = %self.source.name(),
                    %err,
                    "breakpoint reconciliation failed; retiring source adapter"
                );
                self.defunct.store(true, Ordering::SeqCst);
                let mut state = self.state.lock();
                state.pending = None;
                state.in_flight = false;
                drop(state);
                let _ = self.idle.send(());
                return;
            }
        }
    }

    async fn reconcile(&self, desired: Vec<BreakpointRequest>) -> DebugResult<()> {
        let desired_keys: HashSet<_> = desired.iter().map(BreakpointRequest::key).collect();

        // Installed entries with no equivalence match are deleted; the rest
        // are kept as-is. The installed set is swapped down to the kept
        // entries immediately, so a failed delete still counts as gone.
        let (kept, to_delete) = {
            let mut state = self.state.lock();
            let installed = std::mem::take(&mut state.installed);
            let (kept, to_delete): (Vec<_>, Vec<_>) = installed
                .into_iter()
                .partition(|bp| desired_keys.contains(&bp.descriptor.key()));
            state.installed = kept.clone();
            (kept, to_delete)
        };

        for bp in &to_delete {
            self.reporter.forget(&bp.descriptor.key());
        }
        self.strategy
            .remove_batch(&self.source, to_delete, &kept)
            .await;

        // Deduplicate by key so the installed set can never hold two entries
        // for the same breakpoint, even if the editor sent duplicates.
        let mut seen: HashSet<_> = kept.iter().map(|bp| bp.descriptor.key()).collect();
        let to_add: Vec<_> = desired
            .into_iter()
            .filter(|request| seen.insert(request.key()))
            .collect();

        let added = self
            .strategy
            .install_batch(&self.source, to_add, &kept)
            .await?;

        for bp in &added {
            if let Some(actual) = bp.descriptor.actual {
                self.reporter.report(&bp.descriptor, actual);
            }
        }

        let mut state = self.state.lock();
        state.installed = kept.into_iter().chain(added).collect();
        Ok(())
    }

    /// Synthetic URL through which the editor retrieves this source's text
    /// from the runtime when it has no local path.
    pub fn virtual_url(&self) -> String {
        format!("lumen-source://{}/{}", self.session_id, self.id)
    }

    pub fn descriptor(&self) -> SourceDescriptor {
        let metadata = self.source.metadata();
        let url = self.source.url();
        let path = url.and_then(local_path_from_url);

        let name = match url {
            Some(url) => display_name_from_url(url),
            None => {
                let label = metadata.introduction_type.as_deref().unwrap_or("source");
                let digits = self.source.name().trailing_digits();
                if digits.is_empty() {
                    label.to_string()
                } else {
                    format!("{label} {digits}")
                }
            }
        };

        SourceDescriptor {
            name,
            source_reference: path.is_none().then_some(self.id),
            path,
            presentation_hint: metadata.is_black_boxed.then_some("deemphasize"),
        }
    }
}

/// Last URL path segment, query string and fragment stripped.
fn display_name_from_url(url: &str) -> String {
    let trimmed = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => trimmed.to_string(),
    }
}

fn local_path_from_url(url: &str) -> Option<String> {
    let rest = url.strip_prefix("file://")?;
    let path = rest.strip_prefix("localhost").unwrap_or(rest);
    path.starts_with('/').then(|| path.to_string())
}
