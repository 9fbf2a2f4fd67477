//! Shared HTTP client for upstream catalog calls
//!
//! Wraps a `reqwest::Client` and maps transport failures and HTTP status
//! codes onto [`FetchError`], so that catalog clients only deal with
//! decoding. Throttling is not done here: the collector gates every fetch
//! through its per-worker [`RateLimiter`](super::RateLimiter).

use crate::config::HttpConfig;
use crate::error::FetchError;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Default wait reported for a 429 without a usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// HTTP client with status classification
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client with the configured request timeout
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a POST request
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send a request and return the body of a 200 response
    pub async fn send(&self, request: RequestBuilder) -> Result<Bytes, FetchError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let url = response.url().to_string();

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::Network(e.to_string()))?;
                debug!(url = %url, body_size = body.len(), "Received response");
                Ok(body)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

                warn!(url = %url, retry_after = wait, "Rate limited by upstream");
                Err(FetchError::RateLimited(wait))
            }
            StatusCode::NOT_FOUND => {
                debug!(url = %url, "Resource not found (404)");
                Err(FetchError::NotFound)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = %url, status = ?response.status(), "Unauthorized");
                Err(FetchError::Unauthorized)
            }
            status => {
                warn!(url = %url, status = status.as_u16(), "Unexpected status");
                Err(FetchError::ServerError(status.as_u16()))
            }
        }
    }

    /// Send a request and decode the JSON body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::InvalidData(e.to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::NetworkTimeout
    } else if err.is_connect() {
        FetchError::ConnectionRefused
    } else {
        FetchError::Network(err.to_string())
    }
}
