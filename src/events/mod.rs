//! Structured watch events.
//!
//! Watchers and the aggregator report what they do through an [`EventSink`]
//! instead of depending on a concrete telemetry backend.

mod noop;
mod sink;
mod tracing_sink;

pub use noop::*;
pub use sink::*;
pub use tracing_sink::*;
