//! Main PagelistClient

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::error::Error;
use crate::list::ListConfig;
use crate::list::StoreRowRenderer;
use crate::list::Viewport;
use crate::list::VirtualList;
use crate::records::RecordStore;
use crate::records::RecordStoreConfig;
use crate::scheduler::RequestScheduler;
use crate::scheduler::SchedulerConfig;
use crate::storage::PersistentStore;
use crate::transport::EndpointPool;
use crate::transport::HttpTransport;
use crate::transport::Transport;

/// Everything needed to browse one remote collection.
///
/// Bundles the persistent store, the request scheduler and the record store
/// built on them. This client is cheap to clone (uses `Arc` internally) and can
/// be shared across threads safely.
///
/// # Example
///
/// ```ignore
/// use pagelist_lib::PagelistClient;
///
/// let client = PagelistClient::builder()
///     .endpoint("https://mirror-eu.example.org")
///     .build()?;
/// let _scan = client.spawn_retry_scan();
///
/// client.records().get_total(&query, |total| println!("{total} Items"));
/// ```
#[derive(Clone)]
pub struct PagelistClient {
    inner: Arc<PagelistClientInner>,
}

struct PagelistClientInner {
    storage: PersistentStore,
    scheduler: RequestScheduler,
    records: RecordStore,
    endpoints: Option<EndpointPool>,
    http_client: Option<Client>,
    shutdown: CancellationToken,
}

impl PagelistClient {
    /// Creates a new builder for constructing a client.
    pub fn builder() -> PagelistClientBuilder<Missing> {
        PagelistClientBuilder::new()
    }

    /// Returns the record store.
    pub fn records(&self) -> &RecordStore {
        &self.inner.records
    }

    /// Returns the request scheduler.
    pub fn scheduler(&self) -> &RequestScheduler {
        &self.inner.scheduler
    }

    /// Returns the persistent store.
    pub fn storage(&self) -> &PersistentStore {
        &self.inner.storage
    }

    /// Returns the endpoint pool, unless a custom transport was supplied.
    pub fn endpoints(&self) -> Option<&EndpointPool> {
        self.inner.endpoints.as_ref()
    }

    /// Pings every endpoint and re-ranks them by latency.
    ///
    /// Does nothing when a custom transport was supplied.
    pub async fn ping_endpoints(&self) {
        if let (Some(pool), Some(client)) = (&self.inner.endpoints, &self.inner.http_client) {
            pool.ping_all(client).await;
        }
    }

    /// Spawns the scheduler's retry scan. It stops on [`shutdown`](Self::shutdown).
    pub fn spawn_retry_scan(&self) -> JoinHandle<()> {
        self.inner
            .scheduler
            .spawn_retry_scan(self.inner.shutdown.child_token())
    }

    /// Stops background tasks started by this client.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Creates a list that renders [`RecordRow`](crate::list::RecordRow)s from
    /// this client's record store.
    pub fn list(
        &self,
        id: impl Into<String>,
        viewport: Arc<dyn Viewport>,
        config: ListConfig,
    ) -> VirtualList<StoreRowRenderer> {
        VirtualList::new(
            id,
            viewport,
            StoreRowRenderer::new(self.inner.records.clone()),
            self.inner.records.clone(),
            config,
        )
    }
}

impl std::fmt::Debug for PagelistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagelistClient")
            .field("records", &self.inner.records)
            .field("endpoints", &self.inner.endpoints)
            .finish()
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Where requests go.
pub enum Source {
    /// HTTP to the fastest endpoint of a pool.
    Endpoints(EndpointPool),
    /// A caller supplied transport.
    Transport(Arc<dyn Transport>),
}

/// Builder for constructing a [`PagelistClient`].
///
/// Uses the typestate pattern to ensure a request source is set at compile
/// time.
///
/// # Required Fields
///
/// - `endpoint`, `endpoints` or `transport`
///
/// # Example
///
/// ```ignore
/// let client = PagelistClient::builder()
///     .endpoints(pool)
///     .storage(PersistentStore::new(SqliteBackend::open(path)?, StorageConfig::compressed()))
///     .record_config(RecordStoreConfig::default().with_block_size(25))
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub struct PagelistClientBuilder<S> {
    source: S,
    storage: Option<PersistentStore>,
    scheduler_config: SchedulerConfig,
    record_config: RecordStoreConfig,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl PagelistClientBuilder<Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            source: Missing,
            storage: None,
            scheduler_config: SchedulerConfig::default(),
            record_config: RecordStoreConfig::default(),
            timeout: None,
            connect_timeout: None,
            http_client: None,
        }
    }

    /// Sends requests to a single endpoint.
    ///
    /// ```ignore
    /// .endpoint("https://mirror-eu.example.org")
    /// ```
    pub fn endpoint(self, url: impl Into<String>) -> PagelistClientBuilder<Set<Source>> {
        self.endpoints(EndpointPool::single(url))
    }

    /// Sends requests to the fastest endpoint of `pool`.
    pub fn endpoints(self, pool: EndpointPool) -> PagelistClientBuilder<Set<Source>> {
        self.source(Source::Endpoints(pool))
    }

    /// Sends requests through a custom transport.
    pub fn transport(self, transport: Arc<dyn Transport>) -> PagelistClientBuilder<Set<Source>> {
        self.source(Source::Transport(transport))
    }

    fn source(self, source: Source) -> PagelistClientBuilder<Set<Source>> {
        PagelistClientBuilder {
            source: Set(source),
            storage: self.storage,
            scheduler_config: self.scheduler_config,
            record_config: self.record_config,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl Default for PagelistClientBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PagelistClientBuilder<S> {
    /// Sets the persistent store.
    ///
    /// Defaults to an unbounded in-memory store.
    pub fn storage(mut self, storage: PersistentStore) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the scheduler configuration.
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Sets the record store configuration.
    pub fn record_config(mut self, config: RecordStoreConfig) -> Self {
        self.record_config = config;
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl PagelistClientBuilder<Set<Source>> {
    /// Builds the [`PagelistClient`].
    ///
    /// Fails only if the default HTTP client cannot be created.
    pub fn build(self) -> Result<PagelistClient, Error> {
        let (transport, endpoints, http_client): (Arc<dyn Transport>, _, _) = match self.source.0 {
            Source::Transport(transport) => (transport, None, None),
            Source::Endpoints(pool) => {
                let client = match self.http_client {
                    Some(client) => client,
                    None => {
                        let mut builder = Client::builder();
                        if let Some(timeout) = self.connect_timeout {
                            builder = builder.connect_timeout(timeout);
                        }
                        builder.build().map_err(ApiError::from)?
                    }
                };
                let mut http = HttpTransport::new(client.clone(), pool.clone());
                if let Some(timeout) = self.timeout {
                    http = http.with_timeout(timeout);
                }
                (Arc::new(http), Some(pool), Some(client))
            }
        };

        let storage = self.storage.unwrap_or_else(PersistentStore::in_memory);
        let scheduler = RequestScheduler::new(transport, self.scheduler_config);
        let records = RecordStore::new(scheduler.clone(), storage.clone(), self.record_config);

        Ok(PagelistClient {
            inner: Arc::new(PagelistClientInner {
                storage,
                scheduler,
                records,
                endpoints,
                http_client,
                shutdown: CancellationToken::new(),
            }),
        })
    }
}
