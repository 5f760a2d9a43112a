//! Long-poll watch engine
//!
//! A session runs one [`watcher`] task per watched item. Every watcher feeds an
//! unbounded channel drained by a single [`aggregator`] task, which folds
//! observations into a [`ConsulState`](crate::ConsulState) snapshot and passes
//! each result through the [`DependencyGate`]. Dropping the consumer stream
//! cancels the session token and with it every task of the session.

mod aggregator;
mod gate;
mod observer;
mod stream;
mod watcher;

pub use aggregator::*;
pub use gate::*;
pub use observer::*;
pub use stream::*;
pub(crate) use watcher::*;
