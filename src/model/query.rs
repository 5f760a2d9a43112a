use std::fmt;

use super::KeyValueNode;
use super::ServiceNode;

/// One watchable dependency item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchItem {
    /// Catalog entry for a service name
    Service(String),
    /// A single KV key
    Key(String),
    /// Every KV key under a prefix
    KeyPrefix(String),
}

impl WatchItem {
    pub fn name(&self) -> &str {
        match self {
            WatchItem::Service(name) | WatchItem::Key(name) | WatchItem::KeyPrefix(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WatchItem::Service(_) => "service",
            WatchItem::Key(_) => "key",
            WatchItem::KeyPrefix(_) => "key_prefix",
        }
    }
}

impl fmt::Display for WatchItem {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// Decoded body of a blocking-query response
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    Service(Vec<ServiceNode>),
    Key(KeyValueNode),
    Tree(Vec<KeyValueNode>),
}

/// Raw result of one `poll` round trip
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    /// HTTP status returned by the backend
    pub status: u16,
    /// Cursor to send with the next poll
    pub index: u64,
    /// Absent on not-found or empty bodies
    pub payload: Option<QueryPayload>,
}

impl QueryResponse {
    pub fn new(
        status: u16,
        index: u64,
        payload: Option<QueryPayload>,
    ) -> Self {
        Self { status, index, payload }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Server-side failures that are retried with the same cursor
    pub fn is_transient(&self) -> bool {
        (500..600).contains(&self.status)
    }
}
