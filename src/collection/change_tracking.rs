use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use super::KeySelector;
use super::TrackedMap;
use crate::constants::DEFAULT_CHANGE_NOTIFICATION_CAPACITY;

/// Concurrent keyed collection that reports structural changes
///
/// Writers are serialized through one mutex; readers load a point-in-time
/// [`TrackedMap`] without touching it. Every accepted write publishes the whole
/// input batch on a broadcast channel, so subscribers must not assume the
/// payload is exactly the changed subset.
pub struct ChangeTrackingCollection<T> {
    current: ArcSwap<TrackedMap<T>>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<Arc<Vec<T>>>,
}

impl<T> ChangeTrackingCollection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(key_selector: KeySelector<T>) -> Self {
        Self::with_capacity(key_selector, DEFAULT_CHANGE_NOTIFICATION_CAPACITY)
    }

    /// `capacity` bounds how many unread notifications a lagging subscriber keeps
    pub fn with_capacity(
        key_selector: KeySelector<T>,
        capacity: usize,
    ) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            current: ArcSwap::from_pointee(TrackedMap::new(key_selector)),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    pub fn try_update(
        &self,
        value: T,
    ) -> bool {
        self.try_update_all(vec![value])
    }

    /// Apply a batch; returns true and notifies once if any element changed
    pub fn try_update_all(
        &self,
        values: Vec<T>,
    ) -> bool {
        let _guard = self.write_lock.lock();

        let current = self.current.load();
        let Some(next) = current.try_update_all(values.iter().cloned()) else {
            return false;
        };

        self.current.store(Arc::new(next));
        let receivers = self.changes.send(Arc::new(values)).unwrap_or(0);
        trace!(receivers, "change-tracking collection updated");
        true
    }

    /// Point-in-time view; never blocks on writers
    pub fn snapshot(&self) -> Arc<TrackedMap<T>> {
        self.current.load_full()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<T> {
        self.current.load().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive the input batch of every accepted write made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<T>>> {
        self.changes.subscribe()
    }
}
