use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use lumen_rdp::{Position, SourceActor, ThreadActor};

use crate::breakpoints::{
    find_next_valid_position, log_message_to_expression, BreakpointDescriptor, BreakpointRequest,
    InstalledBreakpoint, InstalledHandle,
};
use crate::error::{DebugError, DebugResult};
use crate::pause::PauseCoordinator;

/// Which breakpoint wire variant a session speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolVariant {
    Legacy,
    Modern,
}

/// Protocol-variant capability for installing and removing breakpoints.
///
/// Selected once per session at startup. Reconciliation is written once
/// against this abstraction and never branches on the wire variant itself.
pub enum InstallStrategy {
    /// Positions are resolved client-side against the source's valid
    /// breakpoint positions, then installed through the thread actor.
    Modern { thread: Arc<dyn ThreadActor> },

    /// The runtime resolves positions itself and replies with a dedicated
    /// breakpoint actor, but only accepts installs while the thread is
    /// paused.
    Legacy { pause: Arc<PauseCoordinator> },
}

impl InstallStrategy {
    /// Install `to_add`, resolving actual positions per the variant.
    ///
    /// Individual install failures are dropped, not retried; the entry will
    /// still be present in any future desired set that wants it, and that
    /// set's reconciliation attempts it again. A failure to arrange the
    /// batch (pausing the thread, querying positions) defers the whole batch
    /// the same way. Only a source with no valid positions at all is an
    /// error, which retires the source's adapter.
    pub async fn install_batch(
        &self,
        source: &Arc<dyn SourceActor>,
        to_add: Vec<BreakpointRequest>,
        kept: &[InstalledBreakpoint],
    ) -> DebugResult<Vec<InstalledBreakpoint>> {
        if to_add.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            InstallStrategy::Modern { thread } => {
                let candidates = match source.breakpoint_positions().await {
                    Ok(candidates) => candidates,
                    Err(err) => {
                        tracing::warn!(
                            source = %source.name(),
                            %err,
                            "breakpoint position query failed; deferring installs"
                        );
                        return Ok(Vec::new());
                    }
                };
                if candidates.is_empty() {
                    return Err(DebugError::NoValidPositions {
                        actor: source.name().clone(),
                    });
                }

                // The runtime keys modern breakpoints by position, so
                // requests that resolve to an already-installed position
                // share that remote breakpoint instead of duplicating it.
                let occupied: HashSet<Position> = kept
                    .iter()
                    .filter_map(|bp| bp.modern_position())
                    .collect();

                let mut shared = Vec::new();
                let mut groups: Vec<(Position, Vec<BreakpointRequest>)> = Vec::new();
                for request in to_add {
                    let requested = request.requested_position();
                    let Some(actual) = find_next_valid_position(requested, &candidates) else {
                        tracing::debug!(
                            source = %source.name(),
                            line = request.line,
                            "no valid breakpoint position at or after request; dropping"
                        );
                        continue;
                    };
                    if occupied.contains(&actual) {
                        shared.push(installed_at(request, actual));
                    } else if let Some((_, requests)) =
                        groups.iter_mut().find(|(p, _)| *p == actual)
                    {
                        requests.push(request);
                    } else {
                        groups.push((actual, vec![request]));
                    }
                }

                let url = source_url(source);
                let installs: Vec<_> = groups
                    .into_iter()
                    .map(|(actual, requests)| {
                        let thread = Arc::clone(thread);
                        let url = url.clone();
                        async move {
                            let primary = &requests[0];
                            let result = thread
                                .set_breakpoint(
                                    actual,
                                    &url,
                                    primary.condition.as_deref(),
                                    primary.log_message.as_deref(),
                                )
                                .await;
                            match result {
                                Ok(()) => requests
                                    .into_iter()
                                    .map(|request| installed_at(request, actual))
                                    .collect(),
                                Err(err) => {
                                    tracing::debug!(
                                        position = %actual,
                                        %err,
                                        "breakpoint install failed"
                                    );
                                    Vec::new()
                                }
                            }
                        }
                    })
                    .collect();

                let mut installed: Vec<InstalledBreakpoint> =
                    join_all(installs).await.into_iter().flatten().collect();
                installed.extend(shared);
                Ok(installed)
            }

            InstallStrategy::Legacy { pause } => {
                // The whole add batch shares one paused window.
                let run = pause
                    .run_on_paused(|| {
                        let source = Arc::clone(source);
                        async move {
                            let installs: Vec<_> = to_add
                                .into_iter()
                                .map(|request| {
                                    let source = Arc::clone(&source);
                                    async move { install_legacy(&source, request).await }
                                })
                                .collect();
                            join_all(installs).await
                        }
                    })
                    .await;

                match run {
                    Ok(installed) => Ok(installed.into_iter().flatten().collect()),
                    Err(err) => {
                        tracing::warn!(
                            source = %source.name(),
                            %err,
                            "could not pause thread for breakpoint installs; deferring"
                        );
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    /// Delete `removals`, all concurrently, waiting for every outcome.
    ///
    /// A failed deletion is treated as already gone. Modern-variant handles
    /// are keyed by position, so the remote breakpoint is only removed once
    /// no kept entry (and no other removal) still points at its position.
    pub async fn remove_batch(
        &self,
        source: &Arc<dyn SourceActor>,
        removals: Vec<InstalledBreakpoint>,
        kept: &[InstalledBreakpoint],
    ) {
        if removals.is_empty() {
            return;
        }

        let kept_positions: HashSet<Position> = kept
            .iter()
            .filter_map(|bp| bp.modern_position())
            .collect();
        let url = source_url(source);
        let thread = match self {
            InstallStrategy::Modern { thread } => Some(Arc::clone(thread)),
            InstallStrategy::Legacy { .. } => None,
        };

        let mut vacated = HashSet::new();
        let deletions: Vec<_> = removals
            .into_iter()
            .filter_map(|installed| {
                let target = match installed.handle {
                    InstalledHandle::Legacy(actor) => InstalledHandle::Legacy(actor),
                    InstalledHandle::Modern(position) => {
                        if kept_positions.contains(&position) || !vacated.insert(position) {
                            return None;
                        }
                        InstalledHandle::Modern(position)
                    }
                };
                let thread = thread.clone();
                let url = url.clone();
                Some(async move {
                    let result = match target {
                        InstalledHandle::Legacy(actor) => actor.delete().await,
                        InstalledHandle::Modern(position) => match thread {
                            Some(thread) => thread.remove_breakpoint(position, &url).await,
                            None => Ok(()),
                        },
                    };
                    if let Err(err) = result {
                        tracing::debug!(%err, "breakpoint delete failed; treating it as gone");
                    }
                })
            })
            .collect();

        join_all(deletions).await;
    }
}

fn installed_at(request: BreakpointRequest, actual: Position) -> InstalledBreakpoint {
    InstalledBreakpoint {
        descriptor: BreakpointDescriptor {
            request,
            actual: Some(actual),
        },
        handle: InstalledHandle::Modern(actual),
    }
}

async fn install_legacy(
    source: &Arc<dyn SourceActor>,
    request: BreakpointRequest,
) -> Option<InstalledBreakpoint> {
    // The legacy variant has no logpoint slot; a log template rides in the
    // condition as a logging expression that never pauses. An explicit
    // condition wins when both are set.
    let condition = match (&request.condition, &request.log_message) {
        (Some(condition), _) => Some(condition.clone()),
        (None, Some(template)) => Some(log_message_to_expression(template)),
        (None, None) => None,
    };

    let requested = request.requested_position();
    match source.set_breakpoint(requested, condition.as_deref()).await {
        Ok(reply) => {
            // The runtime's reported position is authoritative. Falling back
            // to the requested position reports a breakpoint "verified" at a
            // spot the runtime never confirmed; kept for parity with clients
            // that expect every accepted install to verify.
            let actual = reply.actual.unwrap_or(requested);
            Some(InstalledBreakpoint {
                descriptor: BreakpointDescriptor {
                    request,
                    actual: Some(actual),
                },
                handle: InstalledHandle::Legacy(reply.actor),
            })
        }
        Err(err) => {
            tracing::debug!(
                source = %source.name(),
                line = request.line,
                %err,
                "breakpoint install failed"
            );
            None
        }
    }
}

fn source_url(source: &Arc<dyn SourceActor>) -> String {
    source
        .url()
        .unwrap_or_else(|| source.name().as_str())
        .to_string()
}
