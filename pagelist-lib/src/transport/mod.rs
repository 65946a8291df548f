//! Transport to the remote collection endpoint.
//!
//! The scheduler only needs "GET this path and give me JSON". The
//! [`Transport`] trait is that seam; [`HttpTransport`] is the production
//! implementation over `reqwest`, routing each request to the fastest mirror
//! of an [`EndpointPool`].

mod endpoint;

pub use endpoint::*;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::error::ApiError;

/// Trait for issuing requests to the remote collection.
///
/// `path` is a path plus query string relative to the endpoint base URL, such
/// as `/request?limit=50&offset=0&searchstring=tea`. It is also the
/// deduplication key used by the scheduler, so it must not depend on which
/// mirror ends up serving the request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `path` and parses the response body as JSON.
    async fn get_json(&self, path: &str) -> Result<Value, ApiError>;
}

/// HTTP transport over `reqwest`.
///
/// Cheap to clone; clones share the connection pool and the endpoint rankings.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoints: EndpointPool,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport over the given endpoints.
    pub fn new(client: Client, endpoints: EndpointPool) -> Self {
        Self {
            client,
            endpoints,
            timeout: None,
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the endpoint pool.
    pub fn endpoints(&self) -> &EndpointPool {
        &self.endpoints
    }

    fn refresh_rankings(&self) {
        if !self.endpoints.ping_due() {
            return;
        }
        let endpoints = self.endpoints.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            endpoints.ping_all(&client).await;
        });
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.refresh_rankings();

        let base = self.endpoints.best().ok_or(ApiError::NoEndpoint)?;
        let url = format!("{}{}", base.trim_end_matches('/'), path);
        url::Url::parse(&url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut request = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| match self.timeout {
            Some(timeout) if e.is_timeout() => ApiError::Timeout(timeout),
            _ => ApiError::Network(e),
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::http(status.as_u16(), body));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::parse_with_body(e.to_string(), body))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoints", &self.endpoints)
            .field("timeout", &self.timeout)
            .finish()
    }
}
