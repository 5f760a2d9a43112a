use std::error::Error as StdError;

use super::EventSink;
use super::WatchEvent;
use crate::model::WatchItem;

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record_event(
        &self,
        _event: WatchEvent<'_>,
    ) {
    }

    fn record_exception(
        &self,
        _item: &WatchItem,
        _error: &(dyn StdError + 'static),
    ) {
    }
}
