//! Long-poll watcher for Consul services and key/value trees.
//!
//! Each watched item runs its own blocking-query loop. Observations from every
//! loop are folded by a single writer into an immutable [`ConsulState`]
//! snapshot, and snapshots are only published once every requested dependency
//! has been resolved at least once.
//!
//! ```ignore
//! use consul_watch::{ConsulObserver, DependencySet};
//! use futures::StreamExt;
//!
//! let observer = ConsulObserver::builder().build()?;
//! let deps = DependencySet::new()
//!     .with_service("billing")
//!     .with_key("apps/billing/port")
//!     .with_key_prefix("apps/billing/features");
//!
//! let mut snapshots = observer.observe_dependencies(deps);
//! while let Some(state) = snapshots.next().await {
//!     let state = state?;
//!     println!("{} services", state.services().count());
//! }
//! ```

mod cache;
mod client;
mod collection;
mod config;
mod constants;
mod errors;
mod events;
mod model;
mod state;
mod watch;

pub use cache::*;
pub use client::*;
pub use collection::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use model::*;
pub use state::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
