//! HTTP destination client
//!
//! Talks to the destination customer collection:
//!
//! - `GET <endpoint>?name=<name>` returns the matching records
//! - `POST <endpoint>` creates a record
//! - `PUT <endpoint>/<id>` updates a record
//! - `DELETE <endpoint>/<id>` deletes a record
//!
//! Every operation runs through the [`RetryManager`], so a rate-limited call
//! is replayed with the same method, URL and body after the backoff.
//!
//! Any 2xx acknowledges a write. When the response body is empty or is not a
//! record with an id, the record that was sent stands in for it.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::DestinationConfig;
use crate::error::RequestError;
use crate::models::{CustomerPayload, DestinationRecord};
use crate::sync::{ApiClient, RetryManager, JSON_CONTENT_TYPE};

use super::DestinationClient;

/// Destination client over HTTP with rate-limit retry
#[derive(Debug, Clone)]
pub struct HttpDestinationClient {
    client: ApiClient,
    retry_manager: RetryManager,
}

impl HttpDestinationClient {
    /// Create a client from the destination configuration
    pub fn new(config: &DestinationConfig) -> Result<Self, RequestError> {
        let client = ApiClient::new(
            &config.endpoint,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_default_retry_after(config.retry.default_retry_after_secs);

        Ok(Self::with_client(
            client,
            RetryManager::new(config.retry.clone()),
        ))
    }

    /// Create a client around an existing API client and retry policy
    pub fn with_client(client: ApiClient, retry_manager: RetryManager) -> Self {
        let client =
            client.with_default_header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        Self {
            client,
            retry_manager,
        }
    }
}

/// Record acknowledged by a write, or `sent` when the body does not describe one
fn acknowledged(body: Option<Value>, sent: DestinationRecord) -> DestinationRecord {
    body.and_then(|body| serde_json::from_value::<DestinationRecord>(body).ok())
        .filter(|record| record.id.is_some())
        .unwrap_or(sent)
}

#[async_trait]
impl DestinationClient for HttpDestinationClient {
    async fn find_by_name(&self, name: &str) -> Result<Vec<DestinationRecord>, RequestError> {
        let query = [("name", name.to_string())];
        let records: Vec<DestinationRecord> = self
            .retry_manager
            .execute(|| self.client.get_json(self.client.endpoint(), &query))
            .await
            .map_err(|e| {
                error!(customer = name, error = %e, "Failed to look up customer");
                e
            })?;

        debug!(customer = name, matches = records.len(), "Looked up customer");
        Ok(records)
    }

    async fn create(&self, payload: &CustomerPayload) -> Result<DestinationRecord, RequestError> {
        let body: Option<Value> = self
            .retry_manager
            .execute(|| {
                self.client
                    .send_json(Method::POST, self.client.endpoint(), payload)
            })
            .await
            .map_err(|e| {
                error!(customer = %payload.name, error = %e, "Failed to create customer");
                e
            })?;

        let record = acknowledged(body, payload.clone().into());
        info!(customer = %record.name, id = ?record.id, "Created customer");
        Ok(record)
    }

    async fn update(&self, payload: &CustomerPayload) -> Result<DestinationRecord, RequestError> {
        let id = payload.id.as_ref().ok_or_else(|| {
            RequestError::InvalidRequest(format!(
                "Cannot update customer {} without an id",
                payload.name
            ))
        })?;
        let url = self.client.resource_url(id);

        let body: Option<Value> = self
            .retry_manager
            .execute(|| self.client.send_json(Method::PUT, &url, payload))
            .await
            .map_err(|e| {
                error!(customer = %payload.name, id = %id, error = %e, "Failed to update customer");
                e
            })?;

        let record = acknowledged(body, payload.clone().into());
        info!(customer = %record.name, id = %id, "Updated customer");
        Ok(record)
    }

    async fn delete(&self, record: &DestinationRecord) -> Result<DestinationRecord, RequestError> {
        let id = record.id.as_ref().ok_or_else(|| {
            RequestError::InvalidRequest(format!(
                "Cannot delete customer {} without an id",
                record.name
            ))
        })?;
        let url = self.client.resource_url(id);

        let body: Option<Value> = self
            .retry_manager
            .execute(|| self.client.delete_json(&url))
            .await
            .map_err(|e| {
                error!(customer = %record.name, id = %id, error = %e, "Failed to delete customer");
                e
            })?;

        let deleted = acknowledged(body, record.clone());
        info!(customer = %deleted.name, id = %id, "Deleted customer");
        Ok(deleted)
    }
}
