//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::transport::Transport;

type Responder = Box<dyn Fn(&str) -> Result<Value, ApiError> + Send + Sync>;

/// Transport that records every path it is asked for and answers from a closure.
pub(crate) struct MockTransport {
    calls: Mutex<Vec<String>>,
    delay: Duration,
    responder: Responder,
}

impl MockTransport {
    pub(crate) fn new(
        responder: impl Fn(&str) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_delay(Duration::ZERO, responder)
    }

    pub(crate) fn with_delay(
        delay: Duration,
        responder: impl Fn(&str) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            delay,
            responder: Box::new(responder),
        })
    }

    /// A collection of `total` records answering count and block requests.
    pub(crate) fn collection(total: usize, delay: Duration) -> Arc<Self> {
        Self::with_delay(delay, move |path| Ok(collection_response(path, total)))
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(path.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(path)
    }
}

/// Parses the query string of a request path.
pub(crate) fn params(path: &str) -> HashMap<String, String> {
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Answers like the remote collection: counts for the count intent, otherwise
/// the `limit`/`offset` slice of `total` synthetic records.
pub(crate) fn collection_response(path: &str, total: usize) -> Value {
    let params = params(path);
    if params.get("query").map(String::as_str) == Some("collectionsetcount") {
        return json!({ "total_count": total });
    }

    let search = params.get("searchstring").cloned().unwrap_or_default();
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(total);
    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let results: Vec<Value> = (offset..total.min(offset + limit))
        .map(|i| json!({ "index": i, "search": search }))
        .collect();
    json!({ "results": results })
}
