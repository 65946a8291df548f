//! Per-path request records and the attempts that resolve them.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::task::AbortHandle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::SchedulerConfig;
use crate::transport::Transport;

/// Completion callback for a request.
///
/// Stored per path; the most recently registered callback is the one invoked.
/// A completed path re-invokes it on every later request for that path.
pub type ResponseCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Observable state of a request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// An attempt is in flight or scheduled.
    Pending,
    /// A response is cached; no further network calls are made.
    Succeeded,
    /// The last attempt failed; only the retry scan can revive it.
    Failed,
}

enum RequestState {
    Pending {
        next_try: Instant,
        attempt: Option<AbortHandle>,
    },
    Succeeded(Arc<Value>),
    Failed {
        at: Instant,
    },
}

impl RequestState {
    /// Returns `true` while a launched attempt has not finished yet.
    fn in_flight(&self) -> bool {
        matches!(self, Self::Pending { attempt: Some(attempt), .. } if !attempt.is_finished())
    }

    fn status(&self) -> RequestStatus {
        match self {
            Self::Pending { .. } => RequestStatus::Pending,
            Self::Succeeded(_) => RequestStatus::Succeeded,
            Self::Failed { .. } => RequestStatus::Failed,
        }
    }
}

struct RequestRecord {
    state: RequestState,
    callback: ResponseCallback,
    attempts: u32,
}

/// Deduplicating request scheduler.
///
/// State machine per path:
///
/// ```text
/// UNSEEN -> PENDING -> SUCCEEDED
///              |  ^
///              v  | (retry scan)
///            FAILED
/// ```
///
/// `SUCCEEDED` is terminal. A response carrying an `error` field drops the
/// record entirely, so the next caller starts over from `UNSEEN`.
///
/// Cheap to clone; clones share the request table.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use pagelist_lib::scheduler::{RequestScheduler, SchedulerConfig};
///
/// let scheduler = RequestScheduler::new(transport, SchedulerConfig::default());
/// let _scan = scheduler.spawn_retry_scan(cancel.clone());
///
/// scheduler.fetch("/request?query=ping", Arc::new(|response| {
///     println!("{response}");
/// }));
/// ```
#[derive(Clone)]
pub struct RequestScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    requests: DashMap<String, RequestRecord>,
}

impl RequestScheduler {
    /// Creates a scheduler that issues requests through `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                transport,
                config,
                requests: DashMap::new(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Requests `path`, launching an attempt only if [`should_execute`](Self::should_execute) allows it.
    pub fn fetch(&self, path: &str, callback: ResponseCallback) {
        if self.should_execute(path, callback) {
            self.launch(path);
        }
    }

    /// Registers `callback` for `path` and decides whether a network attempt
    /// should be made now.
    ///
    /// - unseen: registers a pending record and returns `true`
    /// - succeeded: invokes `callback` with the cached response, returns `false`
    /// - failed: returns `false`
    /// - pending within the cool-down: returns `false`
    /// - pending with an attempt still in flight: returns `false`
    /// - pending past the cool-down: re-arms the cool-down and returns `true`
    pub fn should_execute(&self, path: &str, callback: ResponseCallback) -> bool {
        let now = Instant::now();
        let cool_down = self.inner.config.cool_down;

        let cached = match self.inner.requests.entry(path.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RequestRecord {
                    state: RequestState::Pending {
                        next_try: now + cool_down,
                        attempt: None,
                    },
                    callback,
                    attempts: 0,
                });
                return true;
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.callback = callback;
                if record.state.in_flight() {
                    return false;
                }
                match &mut record.state {
                    RequestState::Succeeded(response) => {
                        (response.clone(), record.callback.clone())
                    }
                    RequestState::Failed { .. } => return false,
                    RequestState::Pending { next_try, .. } if *next_try > now => return false,
                    RequestState::Pending { next_try, .. } => {
                        *next_try = now + cool_down;
                        return true;
                    }
                }
            }
        };

        let (response, callback) = cached;
        callback(&response);
        false
    }

    /// Marks `path` as succeeded and invokes its latest callback.
    ///
    /// A second completion for an already succeeded path is ignored.
    pub fn on_success(&self, path: &str, response: Value) {
        let (callback, response) = {
            let Some(mut record) = self.inner.requests.get_mut(path) else {
                log::debug!("Dropping response for unknown request {}", path);
                return;
            };
            if matches!(record.state, RequestState::Succeeded(_)) {
                log::debug!("Ignoring duplicate response for {}", path);
                return;
            }
            let response = Arc::new(response);
            record.state = RequestState::Succeeded(response.clone());
            (record.callback.clone(), response)
        };

        callback(&response);
    }

    /// Marks `path` as failed. Succeeded paths are unaffected.
    pub fn on_failure(&self, path: &str) {
        if let Some(mut record) = self.inner.requests.get_mut(path)
            && !matches!(record.state, RequestState::Succeeded(_))
        {
            record.state = RequestState::Failed { at: Instant::now() };
        }
    }

    /// Drops the record for `path`, returning it to the unseen state.
    pub fn forget(&self, path: &str) {
        if let Some((_, record)) = self.inner.requests.remove(path)
            && let RequestState::Pending {
                attempt: Some(attempt),
                ..
            } = record.state
        {
            attempt.abort();
        }
    }

    /// Returns the state of `path`, or `None` if it was never requested.
    pub fn status(&self, path: &str) -> Option<RequestStatus> {
        self.inner.requests.get(path).map(|r| r.state.status())
    }

    /// Returns how many network attempts have been launched for `path`.
    pub fn attempts(&self, path: &str) -> u32 {
        self.inner.requests.get(path).map(|r| r.attempts).unwrap_or(0)
    }

    /// Returns the number of tracked paths.
    pub fn len(&self) -> usize {
        self.inner.requests.len()
    }

    /// Returns `true` if no paths are tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.requests.is_empty()
    }

    /// Re-issues every request that is due and returns how many were launched.
    ///
    /// Due means: pending with its cool-down elapsed and no attempt still in
    /// flight, or failed for at least one cool-down when reviving is enabled.
    /// A slow attempt is left to finish; the transport timeout bounds it.
    pub fn retry_due(&self) -> usize {
        let now = Instant::now();
        let config = &self.inner.config;
        let mut due = Vec::new();

        for mut record in self.inner.requests.iter_mut() {
            let is_due = match &record.state {
                state if state.in_flight() => false,
                RequestState::Pending { next_try, .. } => *next_try <= now,
                RequestState::Failed { at } => {
                    config.revive_failed && *at + config.cool_down <= now
                }
                RequestState::Succeeded(_) => false,
            };
            if !is_due {
                continue;
            }

            record.state = RequestState::Pending {
                next_try: now + config.cool_down,
                attempt: None,
            };
            due.push(record.key().clone());
        }

        for path in &due {
            log::info!("Retrying {}", path);
            self.launch(path);
        }
        due.len()
    }

    /// Spawns the periodic retry scan. It runs until `cancel` fires.
    pub fn spawn_retry_scan(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.inner.config.scan_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let retried = scheduler.retry_due();
                        if retried > 0 {
                            log::debug!("Retry scan re-issued {} request(s)", retried);
                        }
                    }
                }
            }
        })
    }

    /// Spawns one attempt for `path`. Callers only get here once the previous
    /// attempt, if any, has finished.
    fn launch(&self, path: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::error!("No async runtime available to fetch {}", path);
            self.on_failure(path);
            return;
        };

        let scheduler = self.clone();
        let key = path.to_string();
        let task = runtime.spawn(async move { scheduler.attempt(&key).await });

        if let Some(mut record) = self.inner.requests.get_mut(path) {
            record.attempts += 1;
            if let RequestState::Pending { attempt, .. } = &mut record.state {
                *attempt = Some(task.abort_handle());
            }
        }
    }

    async fn attempt(&self, path: &str) {
        log::debug!("Fetching {}", path);
        match self.inner.transport.get_json(path).await {
            Ok(response) => match response.get("error").filter(|e| !e.is_null()) {
                Some(error) => {
                    log::error!("Remote error for {}: {}", path, error);
                    self.forget_settled(path);
                }
                None => self.on_success(path, response),
            },
            Err(e) => {
                log::warn!("Request {} failed: {}", path, e);
                self.on_failure(path);
            }
        }
    }

    /// Like [`forget`](Self::forget), but never aborts: called from the attempt itself.
    fn forget_settled(&self, path: &str) {
        self.inner
            .requests
            .remove_if(path, |_, r| !matches!(r.state, RequestState::Succeeded(_)));
    }
}

impl std::fmt::Debug for RequestScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("config", &self.inner.config)
            .field("requests", &self.inner.requests.len())
            .finish()
    }
}
