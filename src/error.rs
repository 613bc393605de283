//! Error types for customer-sync
//!
//! This module defines the error taxonomy used by the synchronization engine
//! and its collaborators. All error types use `thiserror`.

use thiserror::Error;

use crate::models::RunStatistics;

/// Failure of a single HTTP call against the source or destination API
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    /// Request exceeded its deadline
    #[error("Network timeout")]
    Timeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Rate limited by the remote API
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Rate-limit retries gave up
    #[error("Retry budget exhausted after {attempts} attempts ({waited_secs}s spent waiting)")]
    RetryBudgetExhausted {
        /// Number of requests sent, including the first one
        attempts: u32,
        /// Total time spent in backoff
        waited_secs: u64,
    },

    /// Missing or rejected credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found
    #[error("Resource not found")]
    NotFound,

    /// Server error
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Any other non-success status
    #[error("Unexpected status: HTTP {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Request could not be built (bad URL, bad header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),
}

/// Failure while paginating the source API
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    /// A page request failed; the whole extraction is aborted
    #[error("Failed to fetch customers page at offset {offset}: {source}")]
    Page {
        /// Offset of the failing page
        offset: u64,
        /// Underlying request failure
        source: RequestError,
    },
}

/// Watermark storage errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error while writing the watermark file
    #[error("Watermark IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Watermark serialization error: {0}")]
    Serialization(String),

    /// Another run holds the lease on the watermark file
    #[error("Watermark file is locked by another run: {0}")]
    Locked(String),
}

/// Run-level synchronization errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Extraction from the source failed
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Persisting the watermark failed after dispatch completed
    #[error("Persistence failed: {source}")]
    Persistence {
        /// Underlying storage failure
        source: PersistenceError,
        /// Counters of the dispatch that did happen
        statistics: RunStatistics,
    },

    /// The run exceeded its deadline
    #[error("Sync run timed out after {0} seconds")]
    Timeout(u64),
}

impl SyncError {
    /// Statistics of a run that dispatched records before failing
    pub fn statistics(&self) -> Option<&RunStatistics> {
        match self {
            SyncError::Persistence { statistics, .. } => Some(statistics),
            SyncError::Extraction(_) | SyncError::Timeout(_) => None,
        }
    }
}

/// Trait for determining if an error is eligible for the rate-limit retry loop
pub trait RetryableError {
    /// Returns the retry-after hint in seconds if the error is retryable
    fn retry_after(&self) -> Option<u64>;

    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool {
        self.retry_after().is_some()
    }
}

impl RetryableError for RequestError {
    fn retry_after(&self) -> Option<u64> {
        match self {
            RequestError::RateLimited(secs) => Some(*secs),
            _ => None,
        }
    }
}
