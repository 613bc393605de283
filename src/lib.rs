//! customer-sync - Incremental one-way customer synchronization
//!
//! This crate reconciles customer records from a source API into a
//! destination API. Each run extracts the records changed since a persisted
//! watermark, creates or updates them in the destination with bounded
//! concurrency, and advances the watermark.

pub mod config;
pub mod destination;
pub mod error;
pub mod models;
pub mod otel;
pub mod source;
pub mod sync;
pub mod watermark;
