use std::any::Any;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DependencyGate;
use super::WatchMessage;
use crate::events::EventSink;
use crate::events::WatchEvent;
use crate::model::DependencySet;
use crate::model::Observation;
use crate::state::ConsulState;
use crate::Error;
use crate::Result;

/// Folds one observation into a snapshot.
///
/// Returning `Err` or panicking is a handler fault. A long-running session
/// logs it and keeps the previous snapshot; a one-shot session fails with
/// [`Error::Internal`].
pub trait StateFolder: Send + Sync + 'static {
    fn fold(
        &self,
        state: &Arc<ConsulState>,
        observation: &Observation,
    ) -> Result<(bool, Arc<ConsulState>)>;
}

/// Applies observations with [`ConsulState::apply`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFolder;

impl StateFolder for DefaultFolder {
    fn fold(
        &self,
        state: &Arc<ConsulState>,
        observation: &Observation,
    ) -> Result<(bool, Arc<ConsulState>)> {
        Ok(state.apply(observation))
    }
}

pub(crate) type StateMessage = Result<Arc<ConsulState>>;

/// Single writer of a session's snapshot
pub(crate) struct Aggregator {
    state: Arc<ConsulState>,
    gate: DependencyGate,
    folder: Arc<dyn StateFolder>,
    events: Arc<dyn EventSink>,
    abort_on_fault: bool,
}

impl Aggregator {
    pub(crate) fn new(
        deps: DependencySet,
        folder: Arc<dyn StateFolder>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            state: ConsulState::empty(),
            gate: DependencyGate::new(deps),
            folder,
            events,
            abort_on_fault: false,
        }
    }

    /// Make the first handler fault end the session instead of being skipped
    pub(crate) fn abort_on_fault(mut self) -> Self {
        self.abort_on_fault = true;
        self
    }

    pub(crate) fn state(&self) -> &Arc<ConsulState> {
        &self.state
    }

    /// Snapshot to publish before any observation arrived.
    ///
    /// Only an empty dependency set is satisfied by the empty snapshot.
    pub(crate) fn initial(&mut self) -> Option<Arc<ConsulState>> {
        let state = Arc::clone(&self.state);
        self.offer(false, &state)
    }

    /// Fold `observation` and return the snapshot to publish, if any.
    ///
    /// A handler fault keeps the previous snapshot. It is only returned as an
    /// error when the aggregator was built with [`Aggregator::abort_on_fault`].
    pub(crate) fn fold(
        &mut self,
        observation: &Observation,
    ) -> Result<Option<Arc<ConsulState>>> {
        let folded = catch_unwind(AssertUnwindSafe(|| self.folder.fold(&self.state, observation)));

        let fault = match folded {
            Ok(Ok((changed, next))) => {
                self.state = next;
                let state = Arc::clone(&self.state);
                return Ok(self.offer(changed, &state));
            }
            Ok(Err(e)) => {
                warn!(item = %observation.item(), error = %e, "state fold failed, snapshot kept");
                self.events.record_exception(&observation.item(), &e);
                if matches!(e, Error::Internal(_)) {
                    e
                } else {
                    Error::Internal(format!("state fold failed: {}", e))
                }
            }
            Err(panic) => {
                let e = Error::Internal(format!("state fold panicked: {}", panic_message(panic.as_ref())));
                warn!(item = %observation.item(), error = %e, "state fold panicked, snapshot kept");
                self.events.record_exception(&observation.item(), &e);
                e
            }
        };

        if self.abort_on_fault {
            Err(fault)
        } else {
            Ok(None)
        }
    }

    fn offer(
        &mut self,
        changed: bool,
        state: &Arc<ConsulState>,
    ) -> Option<Arc<ConsulState>> {
        let was_satisfied = self.gate.is_satisfied();
        let emitted = self.gate.offer(changed, state);

        if !was_satisfied && self.gate.is_satisfied() {
            let dependencies = self.gate.dependencies().len();
            info!(dependencies, "every dependency resolved, publishing snapshots");
            self.events.record_event(WatchEvent::DependenciesSatisfied { dependencies });
        }
        emitted
    }

    /// Drain `rx` until the session ends.
    ///
    /// A fatal watch error, or a handler fault when aborting on faults, is
    /// forwarded to `out` and cancels the session.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<WatchMessage>,
        out: mpsc::Sender<StateMessage>,
        token: CancellationToken,
    ) {
        if let Some(snapshot) = self.initial() {
            if !publish(&out, &token, Ok(snapshot)).await {
                return;
            }
        }

        loop {
            let message = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("session cancelled, aggregator stopping");
                    break;
                }
                message = rx.recv() => message,
            };

            match message {
                Some(Ok(observation)) => match self.fold(&observation) {
                    Ok(Some(snapshot)) => {
                        if !publish(&out, &token, Ok(snapshot)).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(item = %observation.item(), error = %e, "state fold failed, ending session");
                        publish(&out, &token, Err(e)).await;
                        token.cancel();
                        break;
                    }
                },
                Some(Err(e)) => {
                    error!(item = %e.item(), error = %e, "watch failed, ending session");
                    publish(&out, &token, Err(Error::Watch(e))).await;
                    token.cancel();
                    break;
                }
                None => {
                    debug!("every watcher stopped, aggregator stopping");
                    break;
                }
            }
        }
    }
}

// False when the consumer is gone or the session was cancelled.
async fn publish(
    out: &mpsc::Sender<StateMessage>,
    token: &CancellationToken,
    message: StateMessage,
) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = out.send(message) => sent.is_ok(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
