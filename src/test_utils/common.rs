use std::error::Error as StdError;

use parking_lot::Mutex;

use crate::events::EventSink;
use crate::events::WatchEvent;
use crate::model::WatchItem;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Event sink that keeps everything it is given, for assertions
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<String>>,
    exceptions: Mutex<Vec<(WatchItem, String)>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"<event name> <item>"` per recorded event, in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn exceptions(&self) -> Vec<(WatchItem, String)> {
        self.exceptions.lock().clone()
    }

    pub fn count(
        &self,
        name: &str,
    ) -> usize {
        self.events.lock().iter().filter(|e| e.split(' ').next() == Some(name)).count()
    }
}

impl EventSink for RecordingEventSink {
    fn record_event(
        &self,
        event: WatchEvent<'_>,
    ) {
        self.events.lock().push(event.to_string());
    }

    fn record_exception(
        &self,
        item: &WatchItem,
        error: &(dyn StdError + 'static),
    ) {
        self.exceptions.lock().push((item.clone(), error.to_string()));
    }
}
