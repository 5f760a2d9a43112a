use std::error::Error as StdError;

use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::EventSink;
use super::WatchEvent;
use crate::model::WatchItem;

/// Event sink that forwards to `tracing`, the default for every session
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn record_event(
        &self,
        event: WatchEvent<'_>,
    ) {
        match event {
            WatchEvent::PollCompleted { item, index, status } => {
                trace!(%item, index, status, "poll completed");
            }
            WatchEvent::TransientFailure { item, index, status } => {
                warn!(%item, index, status, "transient backend failure, will retry");
            }
            WatchEvent::WatchStopped { item } => {
                debug!(%item, "watch stopped");
            }
            WatchEvent::DependenciesSatisfied { dependencies } => {
                info!(dependencies, "all dependencies resolved");
            }
        }
    }

    fn record_exception(
        &self,
        item: &WatchItem,
        error: &(dyn StdError + 'static),
    ) {
        warn!(%item, error = %error, "handled watch failure");
    }
}
