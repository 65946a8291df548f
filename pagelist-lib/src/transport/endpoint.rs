//! Regional endpoint selection by measured latency.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::query::INTENT_FIELD;
use crate::query::Query;

/// Configuration for endpoint latency probing.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Minimum time between two rounds of pings.
    ///
    /// Default: 60 seconds
    pub ping_interval: Duration,
    /// Timeout applied to each ping.
    ///
    /// Default: 10 seconds
    pub ping_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(10),
        }
    }
}

impl EndpointConfig {
    /// Sets the ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the per-ping timeout.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }
}

/// One mirror of the remote collection.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL, e.g. `https://eu.example.com`.
    pub url: String,
    /// Human-readable region label.
    pub region: String,
    /// Round-trip time of the last successful ping; `None` if unmeasured or unreachable.
    pub latency: Option<Duration>,
    /// Build timestamp reported by the last ping.
    pub build_timestamp: Option<Value>,
    /// Crawl time reported by the last ping.
    pub crawl_time: Option<Value>,
    /// When the last ping completed.
    pub checked_at: Option<DateTime<Utc>>,
}

impl Endpoint {
    /// Creates an unmeasured endpoint.
    pub fn new(url: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            region: region.into(),
            latency: None,
            build_timestamp: None,
            crawl_time: None,
            checked_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    build_timestamp: Option<Value>,
    crawl_time: Option<Value>,
}

/// A set of mirrors ranked by latency.
///
/// Unmeasured endpoints rank after measured ones and keep their configured
/// order, so the first endpoint is used until pings say otherwise.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pagelist_lib::transport::{Endpoint, EndpointConfig, EndpointPool};
///
/// let pool = EndpointPool::new(
///     [Endpoint::new("https://eu.example.com", "Ireland"), Endpoint::new("https://us.example.com", "Ohio")],
///     EndpointConfig::default(),
/// );
/// assert_eq!(pool.best().as_deref(), Some("https://eu.example.com"));
///
/// pool.record_latency("https://us.example.com", Duration::from_millis(40));
/// assert_eq!(pool.best().as_deref(), Some("https://us.example.com"));
/// ```
#[derive(Clone)]
pub struct EndpointPool {
    inner: Arc<EndpointPoolInner>,
}

struct EndpointPoolInner {
    endpoints: RwLock<Vec<Endpoint>>,
    last_ping: Mutex<Option<Instant>>,
    config: EndpointConfig,
}

impl EndpointPool {
    /// Creates a pool from the given endpoints.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>, config: EndpointConfig) -> Self {
        Self {
            inner: Arc::new(EndpointPoolInner {
                endpoints: RwLock::new(endpoints.into_iter().collect()),
                last_ping: Mutex::new(None),
                config,
            }),
        }
    }

    /// Creates a pool with a single endpoint; no pings are ever sent.
    pub fn single(url: impl Into<String>) -> Self {
        Self::new([Endpoint::new(url, "default")], EndpointConfig::default())
    }

    /// Returns a snapshot of all endpoints.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.inner
            .endpoints
            .read()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Returns the base URL of the fastest known endpoint.
    pub fn best(&self) -> Option<String> {
        let guard = self.inner.endpoints.read().ok()?;
        guard
            .iter()
            .enumerate()
            .min_by_key(|(position, e)| (e.latency.unwrap_or(Duration::MAX), *position))
            .map(|(_, e)| e.url.clone())
    }

    /// Records a successful ping of `url`.
    pub fn record_latency(&self, url: &str, latency: Duration) {
        self.update(url, |endpoint| {
            endpoint.latency = Some(latency);
            endpoint.checked_at = Some(Utc::now());
        });
    }

    /// Marks `url` as unreachable so it ranks last.
    pub fn mark_unreachable(&self, url: &str) {
        self.update(url, |endpoint| {
            endpoint.latency = None;
            endpoint.checked_at = Some(Utc::now());
        });
    }

    /// Returns `true` at most once per ping interval, and never for a pool
    /// with fewer than two endpoints.
    pub fn ping_due(&self) -> bool {
        let count = self.inner.endpoints.read().map(|g| g.len()).unwrap_or(0);
        if count < 2 {
            return false;
        }

        let Ok(mut last) = self.inner.last_ping.lock() else {
            return false;
        };
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.inner.config.ping_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Pings every endpoint concurrently and updates their rankings.
    pub async fn ping_all(&self, client: &Client) {
        let urls: Vec<String> = self.endpoints().into_iter().map(|e| e.url).collect();
        let path = Query::new().with(INTENT_FIELD, "ping").request_path();

        let pings = urls.iter().map(|url| {
            let target = format!("{}{}", url.trim_end_matches('/'), path);
            async move {
                let started = Instant::now();
                let result = client
                    .get(&target)
                    .timeout(self.inner.config.ping_timeout)
                    .send()
                    .await;
                let result = match result {
                    Ok(response) if response.status().is_success() => {
                        response.json::<PingResponse>().await.map_err(|e| e.to_string())
                    }
                    Ok(response) => Err(format!("HTTP {}", response.status())),
                    Err(e) => Err(e.to_string()),
                };
                (url, started.elapsed(), result)
            }
        });

        for (url, elapsed, result) in futures::future::join_all(pings).await {
            match result {
                Ok(ping) => {
                    self.update(url, |endpoint| {
                        endpoint.latency = Some(elapsed);
                        endpoint.build_timestamp = ping.build_timestamp;
                        endpoint.crawl_time = ping.crawl_time;
                        endpoint.checked_at = Some(Utc::now());
                    });
                    log::info!("Endpoint {} answered ping in {:?}", url, elapsed);
                }
                Err(e) => {
                    log::warn!("Endpoint {} failed ping: {}", url, e);
                    self.mark_unreachable(url);
                }
            }
        }
    }

    fn update(&self, url: &str, apply: impl FnOnce(&mut Endpoint)) {
        if let Ok(mut guard) = self.inner.endpoints.write()
            && let Some(endpoint) = guard.iter_mut().find(|e| e.url == url)
        {
            apply(endpoint);
        }
    }
}

impl std::fmt::Debug for EndpointPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointPool")
            .field("endpoints", &self.endpoints())
            .field("config", &self.inner.config)
            .finish()
    }
}
