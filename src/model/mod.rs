//! Domain types shared by the client, the watcher and the state aggregator

mod dependency;
mod kv;
mod observation;
mod query;
mod service;

pub use dependency::*;
pub use kv::KeyValueNode;
pub(crate) use kv::*;
pub use observation::*;
pub use query::*;
pub use service::*;
