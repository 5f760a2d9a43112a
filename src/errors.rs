//! Watch Engine Error Hierarchy
//!
//! Errors are split by where they originate so callers can decide how to react:
//! - [`ClientError`]: the blocking-query transport could not produce a response
//! - [`WatchError`]: a watched item hit a fatal condition and its loop stopped
//! - [`Error::Internal`]: the fold pipeline itself failed (a programming defect)
//!
//! Transient backend failures (5xx) never show up here unless retries are disabled.

use config::ConfigError;

use crate::model::QueryPayload;
use crate::model::WatchItem;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A watched item stopped because the backend could not be used
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Transport failures outside of a watch loop
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Fold task or session failure unrelated to the backend
    #[error("Internal watch error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the failure came from talking to the backend.
    ///
    /// Configuration binders use this to decide between an emergency-cache
    /// fallback and treating the failure as a defect.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Error::Watch(_) | Error::Client(_))
    }
}

/// Fatal outcome of one item's long-poll loop
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Network-level failure (connect refused, reset, timeout)
    #[error("Backend unreachable while watching {item}: {source}")]
    Unreachable {
        item: WatchItem,
        #[source]
        source: ClientError,
    },

    /// Status code that is neither success, not-found nor server-side transient
    #[error("Unexpected status {status} while watching {item}")]
    UnexpectedStatus {
        item: WatchItem,
        status: u16,
        index: u64,
        payload: Option<QueryPayload>,
    },

    /// Successful status but a payload that does not belong to the watched item
    #[error("Malformed response while watching {item}: {message}")]
    MalformedResponse { item: WatchItem, status: u16, message: String },

    /// Server-side failure while the retry policy is disabled
    #[error("Server error {status} while watching {item} and retries are disabled")]
    TransientRetryDisabled { item: WatchItem, status: u16, index: u64 },
}

impl WatchError {
    pub fn item(&self) -> &WatchItem {
        match self {
            WatchError::Unreachable { item, .. }
            | WatchError::UnexpectedStatus { item, .. }
            | WatchError::MalformedResponse { item, .. }
            | WatchError::TransientRetryDisabled { item, .. } => item,
        }
    }

    /// Raw status code, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            WatchError::Unreachable { .. } => None,
            WatchError::UnexpectedStatus { status, .. }
            | WatchError::MalformedResponse { status, .. }
            | WatchError::TransientRetryDisabled { status, .. } => Some(*status),
        }
    }
}

/// Failure to obtain a response from the blocking-query endpoint
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Request could not be sent or the connection dropped
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response from {url} (status {status}): {message}")]
    Decode { url: String, status: u16, message: String },

    /// Malformed endpoint address
    #[error("Invalid backend address: {0}")]
    InvalidAddress(String),
}
