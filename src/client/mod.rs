//! Blocking-query transport
//!
//! Watchers talk to the backend through [`BlockingQueryClient`] only:
//! - [`HttpQueryClient`] - reqwest implementation of the Consul HTTP API
//! - `MockBlockingQueryClient` - mockall double for unit tests
//!
//! # Basic Usage
//! ```ignore
//! use consul_watch::{BlockingQueryClient, ConsulConfig, HttpQueryClient, WatchItem};
//! use std::time::Duration;
//!
//! let client = HttpQueryClient::new(&ConsulConfig::default())?;
//! let response = client
//!     .poll(&WatchItem::Key("apps/myapp/port".into()), 0, Duration::from_secs(30))
//!     .await?;
//! println!("index {} status {}", response.index, response.status);
//! ```

mod http;

pub use http::*;


use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::model::QueryResponse;
use crate::model::WatchItem;
use crate::ClientError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlockingQueryClient: Send + Sync + 'static {
    /// Issues one blocking query for `item`.
    ///
    /// The backend holds the request until the item changes past `index` or
    /// `max_wait` elapses. Any HTTP status is a response; only a failure to
    /// obtain one is an error.
    ///
    /// # Arguments
    /// * `item` - Service, key or key prefix to query
    /// * `index` - Cursor from the previous response, zero for the first poll
    /// * `max_wait` - Longest time the backend may hold the request
    async fn poll(
        &self,
        item: &WatchItem,
        index: u64,
        max_wait: Duration,
    ) -> std::result::Result<QueryResponse, ClientError>;
}
