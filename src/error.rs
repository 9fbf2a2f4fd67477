//! Application error types for scope-watch
//!
//! This module defines the error types used throughout the pipeline.
//! All error types use `thiserror` for ergonomic error handling.
//!
//! A missing baseline snapshot is not an error: stores report it as
//! `Ok(None)` so the watcher can seed instead of diffing.

use thiserror::Error;

/// Snapshot store errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Backend (Redis) transport or command failure
    #[error("Store backend error: {0}")]
    Redis(String),

    /// Stored payload is not a JSON array of strings
    #[error("Corrupt snapshot under key {key}: {reason}")]
    Corrupt {
        /// Key holding the bad payload
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Snapshot could not be encoded
    #[error("Snapshot serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Redis(err.to_string())
    }
}

/// Upstream fetch errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Rate limited by upstream
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Server error
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Credentials rejected
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found
    #[error("Resource not found")]
    NotFound,

    /// Invalid data received
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),

    /// The whole fetch exceeded the per-call deadline
    #[error("Fetch timed out after {0} seconds")]
    Timeout(u64),
}

/// A single partition that could not be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionFailure {
    /// Partition identifier (e.g. a program handle)
    pub partition: String,
    /// Why the fetch failed
    pub error: FetchError,
}

impl std::fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.partition, self.error)
    }
}

/// Collection errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollectError {
    /// Listing partitions failed before any fetch was attempted
    #[error("Failed to list partitions: {0}")]
    Partitions(#[from] FetchError),

    /// At least one partition failed under the fail-fast policy
    #[error("{failed} of {total} partitions failed")]
    PartialFailure {
        /// Number of failed partitions
        failed: usize,
        /// Number of partitions attempted
        total: usize,
    },

    /// Error rate exceeded the configured threshold
    #[error("{failed} of {total} partitions failed, above error-rate threshold {threshold}")]
    ErrorRateExceeded {
        /// Number of failed partitions
        failed: usize,
        /// Number of partitions attempted
        total: usize,
        /// Configured maximum error rate
        threshold: f64,
    },

    /// Reading the baseline store failed while deriving partitions
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The snapshot partitions are derived from does not exist yet
    #[error("Partition source unavailable: {0}")]
    NoPartitionSource(String),
}

/// Notification channel errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChannelError {
    /// Redis pub/sub failure
    #[error("Channel backend error: {0}")]
    Redis(String),

    /// The channel has no live broker
    #[error("Channel closed")]
    Closed,
}

impl From<redis::RedisError> for ChannelError {
    fn from(err: redis::RedisError) -> Self {
        ChannelError::Redis(err.to_string())
    }
}

/// Outbound delivery errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeliveryError {
    /// Transport returned a non-success status
    #[error("Delivery API error: HTTP {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Request could not be sent
    #[error("Delivery network error: {0}")]
    Network(String),

    /// Request exceeded the transport timeout
    #[error("Delivery timed out")]
    Timeout,
}

/// Application-level error type
///
/// Aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Collection error
    #[error("Collection error: {0}")]
    Collect(#[from] CollectError),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Delivery error
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::NetworkTimeout => true,
            FetchError::ConnectionRefused => true,
            FetchError::RateLimited(_) => true,
            FetchError::ServerError(code) if *code >= 500 => true,
            FetchError::Network(_) => true,
            FetchError::Timeout(_) => true,

            FetchError::InvalidData(_) => false,
            FetchError::NotFound => false,
            FetchError::Unauthorized => false,
            FetchError::ServerError(_) => false,
        }
    }
}

/// Every failed delivery is retried, whatever the status code.
impl RetryableError for DeliveryError {
    fn is_retryable(&self) -> bool {
        true
    }
}
