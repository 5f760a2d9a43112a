use std::error::Error as StdError;
use std::fmt;

use crate::model::WatchItem;

/// Something worth recording about a watch session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent<'a> {
    /// A poll returned a success or not-found response
    PollCompleted { item: &'a WatchItem, index: u64, status: u16 },

    /// A server-side failure that will be retried with the same cursor
    TransientFailure { item: &'a WatchItem, index: u64, status: u16 },

    /// An item's loop ended, either cancelled or after a fatal error
    WatchStopped { item: &'a WatchItem },

    /// The first snapshot resolving every dependency was published
    DependenciesSatisfied { dependencies: usize },
}

impl WatchEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            WatchEvent::PollCompleted { .. } => "poll_completed",
            WatchEvent::TransientFailure { .. } => "transient_failure",
            WatchEvent::WatchStopped { .. } => "watch_stopped",
            WatchEvent::DependenciesSatisfied { .. } => "dependencies_satisfied",
        }
    }

    pub fn item(&self) -> Option<&WatchItem> {
        match self {
            WatchEvent::PollCompleted { item, .. }
            | WatchEvent::TransientFailure { item, .. }
            | WatchEvent::WatchStopped { item } => Some(*item),
            WatchEvent::DependenciesSatisfied { .. } => None,
        }
    }
}

impl fmt::Display for WatchEvent<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.item() {
            Some(item) => write!(f, "{} {}", self.name(), item),
            None => f.write_str(self.name()),
        }
    }
}

/// Structured telemetry interface for watch sessions.
///
/// # Thread Safety
///
/// One sink is shared by every task of a session, so implementations must be
/// `Send + Sync`.
pub trait EventSink: Send + Sync + 'static {
    fn record_event(
        &self,
        event: WatchEvent<'_>,
    );

    /// Record a failure that was handled without stopping the session
    fn record_exception(
        &self,
        item: &WatchItem,
        error: &(dyn StdError + 'static),
    );
}
