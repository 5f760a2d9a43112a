//! Snapshot model folded from watch observations
//!
//! [`ConsulState`] is an immutable value: every update yields a new `Arc` or
//! hands back the same one for a no-op, which is what lets the gate emit
//! exactly once per genuine change.

mod consul_state;
mod kv_store;

pub use consul_state::*;
pub use kv_store::*;
