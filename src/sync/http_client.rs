//! Authenticated JSON HTTP client for the source and destination APIs
//!
//! This module wraps `reqwest` with the API key header, a per-request
//! deadline, and a uniform mapping from HTTP outcomes to [`RequestError`].
//! HTTP 429 responses are surfaced as [`RequestError::RateLimited`] carrying
//! the `Retry-After` hint; retrying is left to the caller.

use crate::error::RequestError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, warn};

/// Content type sent with every destination request
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP client bound to one API endpoint and key
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
    default_retry_after_secs: u64,
}

impl ApiClient {
    /// Create a client for `endpoint` with the given request deadline
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(client, endpoint, api_key)
    }

    /// Create a client around an existing reqwest Client
    pub fn with_client(client: Client, endpoint: &str, api_key: &str) -> Result<Self, RequestError> {
        let mut auth = HeaderValue::from_str(api_key).map_err(|_| {
            RequestError::InvalidRequest("API key is not a valid header value".to_string())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            headers,
            default_retry_after_secs: 1,
        })
    }

    /// Add a header sent with every request
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Retry-After hint used when a 429 response carries none
    pub fn with_default_retry_after(mut self, secs: u64) -> Self {
        self.default_retry_after_secs = secs;
        self
    }

    /// Base endpoint URL without trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL of a single resource below the endpoint
    pub fn resource_url(&self, id: &impl Display) -> String {
        format!("{}/{}", self.endpoint, id)
    }

    /// GET `url` with query parameters and decode the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let request = self.client.get(url).query(query);
        self.execute(request, Method::GET, url).await
    }

    /// Send `body` as JSON with `method` and decode the JSON response
    pub async fn send_json<T, B>(&self, method: Method, url: &str, body: &B) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| RequestError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        let request = self.client.request(method.clone(), url).body(payload);
        self.execute(request, method, url).await
    }

    /// DELETE `url` and decode the JSON response
    pub async fn delete_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RequestError> {
        let request = self.client.delete(url);
        self.execute(request, Method::DELETE, url).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: Method,
        url: &str,
    ) -> Result<T, RequestError> {
        debug!(method = %method, url = url, "Sending HTTP request");

        let response = request
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| RequestError::Network(e.to_string()))?;
            debug!(url = url, status = status.as_u16(), body_size = body.len(), "Received response");
            // An empty success body (204 No Content) decodes as JSON null
            let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
                b"null"
            } else {
                &body
            };
            return serde_json::from_slice(body)
                .map_err(|e| RequestError::InvalidData(format!("{}: {}", url, e)));
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = parse_retry_after(response.headers())
                    .unwrap_or(self.default_retry_after_secs);
                warn!(url = url, retry_after = wait, "Rate limited by upstream");
                Err(RequestError::RateLimited(wait))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = url, status = status.as_u16(), "Unauthorized");
                Err(RequestError::Unauthorized)
            }
            StatusCode::NOT_FOUND => {
                debug!(url = url, "Resource not found (404)");
                Err(RequestError::NotFound)
            }
            status if status.is_server_error() => {
                warn!(url = url, status = status.as_u16(), "Server error");
                Err(RequestError::ServerError(status.as_u16()))
            }
            status => {
                warn!(url = url, status = status.as_u16(), "Unexpected status");
                Err(RequestError::Status(status.as_u16()))
            }
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout
    } else if e.is_connect() {
        RequestError::ConnectionRefused
    } else if e.is_builder() {
        RequestError::InvalidRequest(e.to_string())
    } else {
        RequestError::Network(e.to_string())
    }
}

/// Parse an integer-seconds Retry-After header
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
