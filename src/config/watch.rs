use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What a watcher does after a server-side (5xx) failure.
///
/// The cursor is never advanced by a failed round, whichever variant is used.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Surface the failure as a fatal error and stop the item.
    Disabled,

    /// Re-issue the query at once.
    Immediate,

    /// Sleep before re-issuing the query. A zero delay behaves as `Immediate`.
    FixedDelay { delay_ms: u64 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::FixedDelay {
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Pause before the next attempt; `None` when retries are disabled
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryPolicy::Disabled => None,
            RetryPolicy::Immediate => Some(Duration::ZERO),
            RetryPolicy::FixedDelay { delay_ms } => Some(Duration::from_millis(*delay_ms)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, RetryPolicy::Disabled)
    }
}

/// Long-poll loop and publishing parameters
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// Maximum time the backend may hold a blocking query (unit: milliseconds)
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Reaction to server-side failures
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Snapshots buffered for a slow consumer before the aggregator waits
    #[serde(default = "default_output_buffer_size")]
    pub output_buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            retry: RetryPolicy::default(),
            output_buffer_size: default_output_buffer_size(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_wait_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.max_wait_ms must be greater than 0".into(),
            )));
        }

        if self.output_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.output_buffer_size must be at least 1".into(),
            )));
        }

        Ok(())
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

fn default_max_wait_ms() -> u64 {
    300_000
}
fn default_retry_delay_ms() -> u64 {
    5000
}
fn default_output_buffer_size() -> usize {
    16
}
