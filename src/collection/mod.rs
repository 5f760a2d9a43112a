//! Keyed containers with structural change detection
//!
//! [`TrackedMap`] is the immutable building block used inside snapshots.
//! [`ChangeTrackingCollection`] wraps one behind a write lock for shared,
//! mutable use with a change notification.
//!
//! Watch sessions only use [`TrackedMap`]: each session has a single writer
//! and publishes whole snapshots, so it needs neither the lock nor the
//! notification. [`ChangeTrackingCollection`] is exported for callers that
//! keep their own shared registry, such as a binder caching resolved values.

mod change_tracking;
mod tracked_map;

pub use change_tracking::*;
pub use tracked_map::*;
