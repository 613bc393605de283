//! Offset-paginated HTTP source reader
//!
//! The source API returns a plain JSON array of customers per page. Pages are
//! requested with `offset` and, once a watermark exists, `updatedAt`. A page
//! shorter than the page size is taken as the last one; a short page in the
//! middle of a result set would therefore end extraction early.
//!
//! Records are decoded one by one. A record without a usable `name` is
//! logged and skipped but still counts towards the page length.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::{ExtractionError, RequestError};
use crate::models::{SourceRecord, Watermark};
use crate::sync::ApiClient;

use super::SourceReader;

/// Source reader over the customer list endpoint
#[derive(Debug, Clone)]
pub struct HttpSourceReader {
    client: ApiClient,
    page_size: u64,
}

impl HttpSourceReader {
    /// Create a reader from the source configuration
    pub fn new(config: &SourceConfig) -> Result<Self, RequestError> {
        let client = ApiClient::new(
            &config.endpoint,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::with_client(client, config.page_size))
    }

    /// Create a reader around an existing API client
    pub fn with_client(client: ApiClient, page_size: u64) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    /// Records requested per page
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    async fn fetch_page(
        &self,
        offset: u64,
        watermark: Option<&Watermark>,
    ) -> Result<Vec<Value>, RequestError> {
        let mut query = vec![("offset", offset.to_string())];
        if let Some(watermark) = watermark {
            query.push(("updatedAt", watermark.as_str().to_string()));
        }
        self.client.get_json(self.client.endpoint(), &query).await
    }
}

#[async_trait]
impl SourceReader for HttpSourceReader {
    async fn fetch_changed(
        &self,
        watermark: Option<Watermark>,
    ) -> Result<Vec<SourceRecord>, ExtractionError> {
        let mut records = Vec::new();
        let mut offset = 0u64;

        loop {
            let page = self
                .fetch_page(offset, watermark.as_ref())
                .await
                .map_err(|source| ExtractionError::Page { offset, source })?;

            let count = page.len() as u64;
            debug!(offset = offset, count = count, "Fetched customers page");
            records.extend(page.into_iter().enumerate().filter_map(|(index, raw)| {
                match serde_json::from_value::<SourceRecord>(raw) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(
                            offset = offset,
                            index = index,
                            error = %e,
                            "Skipping undecodable customer"
                        );
                        None
                    }
                }
            }));

            if count < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        info!(
            count = records.len(),
            watermark = watermark.as_ref().map(Watermark::as_str),
            "Fetched changed customers"
        );
        Ok(records)
    }
}
