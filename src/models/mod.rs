//! Domain models for customer-sync
//!
//! This module contains the core domain models used throughout the application.

pub mod customer;
pub mod stats;
pub mod watermark;

// Re-export commonly used types
pub use customer::{CustomerPayload, DestinationRecord, RecordId, SourceRecord};
pub use stats::{ReconcileOutcome, RunStatistics};
pub use watermark::Watermark;
