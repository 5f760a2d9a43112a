use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;

use crate::client::BlockingQueryClient;
use crate::events::EventSink;
use crate::events::WatchEvent;
use crate::model::Observation;
use crate::model::QueryResponse;
use crate::model::WatchItem;
use crate::ClientError;
use crate::RetryPolicy;
use crate::WatchError;

/// What a watcher hands to its consumer: an observation, or the fatal error
/// that ended its loop
pub(crate) type WatchMessage = std::result::Result<Observation, WatchError>;

/// Everything a watcher needs besides its item, shared by one session
#[derive(Clone)]
pub(crate) struct WatcherContext {
    pub(crate) client: Arc<dyn BlockingQueryClient>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) max_wait: Duration,
    pub(crate) retry: RetryPolicy,
}

/// Outcome of one poll round
#[derive(Debug)]
pub(crate) enum PollOutcome {
    /// Success or not-found: publish and poll again with the new cursor
    Observed { observation: Observation, status: u16 },
    /// Server-side failure: keep the cursor and retry after the delay
    Retry { status: u16, delay: Duration },
    /// Stop this item
    Fatal(WatchError),
}

/// Classify one poll result for `item`.
///
/// `index` is the cursor that was sent; it is what a disabled retry reports.
pub(crate) fn classify(
    item: &WatchItem,
    index: u64,
    result: std::result::Result<QueryResponse, ClientError>,
    retry: &RetryPolicy,
) -> PollOutcome {
    let response = match result {
        Ok(response) => response,
        Err(ClientError::Decode { status, message, .. }) => {
            return PollOutcome::Fatal(WatchError::MalformedResponse {
                item: item.clone(),
                status,
                message,
            })
        }
        Err(source) => {
            return PollOutcome::Fatal(WatchError::Unreachable {
                item: item.clone(),
                source,
            })
        }
    };

    if response.is_success() || response.is_not_found() {
        let status = response.status;
        return match Observation::from_response(item, response) {
            Ok(observation) => PollOutcome::Observed { observation, status },
            Err(e) => PollOutcome::Fatal(e),
        };
    }

    if response.is_transient() {
        return match retry.delay() {
            Some(delay) => PollOutcome::Retry {
                status: response.status,
                delay,
            },
            None => PollOutcome::Fatal(WatchError::TransientRetryDisabled {
                item: item.clone(),
                status: response.status,
                index,
            }),
        };
    }

    PollOutcome::Fatal(WatchError::UnexpectedStatus {
        item: item.clone(),
        status: response.status,
        index: response.index,
        payload: response.payload,
    })
}

/// Spawn the long-poll loop for `item`.
///
/// The loop ends when `token` is cancelled, when the receiving side is gone,
/// or right after a fatal error has been sent.
pub(crate) fn spawn_watcher(
    item: WatchItem,
    ctx: WatcherContext,
    tx: mpsc::UnboundedSender<WatchMessage>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_watcher(&item, &ctx, &tx, &token).await;
        ctx.events.record_event(WatchEvent::WatchStopped { item: &item });
    })
}

async fn run_watcher(
    item: &WatchItem,
    ctx: &WatcherContext,
    tx: &mpsc::UnboundedSender<WatchMessage>,
    token: &CancellationToken,
) {
    let mut index = 0u64;

    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(%item, "watch cancelled while polling");
                return;
            }
            result = ctx.client.poll(item, index, ctx.max_wait) => result,
        };

        // A poll that completed concurrently with cancellation is discarded.
        if token.is_cancelled() {
            return;
        }

        match classify(item, index, result, &ctx.retry) {
            PollOutcome::Observed { observation, status } => {
                let next_index = observation.index();
                ctx.events.record_event(WatchEvent::PollCompleted {
                    item,
                    index: next_index,
                    status,
                });
                trace!(%item, from = index, to = next_index, "cursor advanced");
                index = next_index;

                if tx.send(Ok(observation)).is_err() {
                    debug!(%item, "observation receiver dropped");
                    return;
                }
            }
            PollOutcome::Retry { status, delay } => {
                ctx.events.record_event(WatchEvent::TransientFailure { item, index, status });

                if delay.is_zero() {
                    tokio::task::yield_now().await;
                    continue;
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(%item, "watch cancelled during retry delay");
                        return;
                    }
                    _ = sleep(delay) => {}
                }
            }
            PollOutcome::Fatal(e) => {
                error!(%item, index, error = %e, "watch stopped by fatal error");
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}
