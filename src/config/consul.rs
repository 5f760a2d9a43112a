use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Connection settings for the backend HTTP API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConsulConfig {
    /// Base URL of the agent, scheme included
    #[serde(default = "default_address")]
    pub address: String,

    /// ACL token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// Datacenter to query instead of the agent's own
    #[serde(default)]
    pub datacenter: Option<String>,

    /// Extra time granted on top of the blocking wait before a request is
    /// considered lost (unit: milliseconds)
    #[serde(default = "default_request_timeout_slack_ms")]
    pub request_timeout_slack_ms: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            token: None,
            datacenter: None,
            request_timeout_slack_ms: default_request_timeout_slack_ms(),
        }
    }
}

impl ConsulConfig {
    pub fn validate(&self) -> Result<()> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "consul.address cannot be empty".into(),
            )));
        }

        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(Error::Config(ConfigError::Message(format!(
                "consul.address must start with http:// or https://, got {address}"
            ))));
        }

        if matches!(&self.datacenter, Some(dc) if dc.trim().is_empty()) {
            return Err(Error::Config(ConfigError::Message(
                "consul.datacenter cannot be blank when set".into(),
            )));
        }

        Ok(())
    }

    /// Client-side deadline for one blocking query.
    ///
    /// The backend adds up to `max_wait / 16` of jitter to the wait, so the
    /// deadline covers that plus the configured slack.
    pub fn request_timeout(
        &self,
        max_wait: Duration,
    ) -> Duration {
        max_wait
            .saturating_add(max_wait / 16)
            .saturating_add(Duration::from_millis(self.request_timeout_slack_ms))
    }
}

fn default_address() -> String {
    "http://127.0.0.1:8500".to_string()
}
fn default_request_timeout_slack_ms() -> u64 {
    5000
}
