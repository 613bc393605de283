//! Synchronization core
//!
//! # Components
//!
//! - [`engine`]: the reconciliation engine driving one sync run
//! - [`http_client`]: authenticated JSON client shared by the source and destination
//! - [`retry`]: bounded retry policy for rate-limited destination calls
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use customer_sync::destination::HttpDestinationClient;
//! use customer_sync::source::HttpSourceReader;
//! use customer_sync::sync::ReconciliationEngine;
//! use customer_sync::watermark::FileWatermarkStore;
//!
//! let engine = ReconciliationEngine::new(
//!     Arc::new(HttpSourceReader::new(&config.source)?),
//!     Arc::new(HttpDestinationClient::new(&config.destination)?),
//!     Arc::new(FileWatermarkStore::new("last_sync_date.json")),
//!     config.sync.max_concurrent_requests,
//! );
//! let report = engine.run().await?;
//! ```

pub mod engine;
pub mod http_client;
pub mod retry;

// Re-export main types for convenience
pub use engine::{ReconciliationEngine, RunReport};
pub use http_client::{ApiClient, JSON_CONTENT_TYPE};
pub use retry::RetryManager;
