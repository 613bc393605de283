//! Source reader trait definition

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::models::{SourceRecord, Watermark};

/// Reads changed customers from the source system
///
/// Implementations must return either every record changed at or after the
/// watermark, or an error. A partial result is never returned.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Fetch all records modified at or after `watermark`
    ///
    /// `None` means first run: every record is returned.
    async fn fetch_changed(
        &self,
        watermark: Option<Watermark>,
    ) -> Result<Vec<SourceRecord>, ExtractionError>;
}
