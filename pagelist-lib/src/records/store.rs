//! The record store and its per-query callback table.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde_json::Value;

use super::Block;
use super::RecordStoreConfig;
use crate::query::INTENT_FIELD;
use crate::query::Query;
use crate::scheduler::RequestScheduler;
use crate::storage::PersistentStore;
use crate::storage::record_key;

/// Callback receiving one record.
pub type RecordCallback = Box<dyn FnOnce(Value) + Send>;

/// Identifies one caller in the callback table.
///
/// A caller that registers again for the same record replaces its earlier
/// callback instead of queueing another one.
pub type WaiterId = u64;

/// normalized query -> index -> callers waiting for that index
type CallbackTable = HashMap<String, HashMap<usize, Vec<(WaiterId, RecordCallback)>>>;

/// Paginated access to a remote collection.
///
/// Records and totals are cached in the [`PersistentStore`]; network requests
/// go through the [`RequestScheduler`], so concurrent lookups inside one
/// uncached block share a single fetch.
///
/// Cheap to clone; clones share the callback table.
///
/// # Example
///
/// ```ignore
/// let store = RecordStore::new(scheduler, storage, RecordStoreConfig::default());
/// let query = Query::new().with("searchstring", "tea");
///
/// store.get_total(&query, |total| println!("{total} matches"));
/// store.get_record(&query, 120, |record| println!("{record}"));
/// ```
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<RecordStoreInner>,
}

struct RecordStoreInner {
    scheduler: RequestScheduler,
    storage: PersistentStore,
    config: RecordStoreConfig,
    callbacks: Mutex<CallbackTable>,
    next_waiter: AtomicU64,
}

impl RecordStore {
    /// Creates a record store.
    pub fn new(
        scheduler: RequestScheduler,
        storage: PersistentStore,
        config: RecordStoreConfig,
    ) -> Self {
        let config = RecordStoreConfig {
            block_size: config.block_size.max(1),
            ..config
        };
        Self {
            inner: Arc::new(RecordStoreInner {
                scheduler,
                storage,
                config,
                callbacks: Mutex::new(HashMap::new()),
                next_waiter: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the configured block size.
    pub fn block_size(&self) -> usize {
        self.inner.config.block_size
    }

    /// Returns the scheduler used for network requests.
    pub fn scheduler(&self) -> &RequestScheduler {
        &self.inner.scheduler
    }

    /// Returns the persistent store used as the record cache.
    pub fn storage(&self) -> &PersistentStore {
        &self.inner.storage
    }

    /// Request path of the count request for `query`.
    pub fn count_path(&self, query: &Query) -> String {
        query
            .clone()
            .with(INTENT_FIELD, self.inner.config.count_intent.as_str())
            .request_path()
    }

    /// Request path of one block of `query`.
    pub fn block_path(&self, query: &Query, block: Block) -> String {
        query
            .clone()
            .with("limit", block.size)
            .with("offset", block.offset())
            .request_path()
    }

    /// Fetches the total number of records matching `query`.
    ///
    /// The total is persisted under the normalized query before `callback`
    /// runs. `callback` is invoked at most once.
    pub fn get_total(&self, query: &Query, callback: impl FnOnce(usize) + Send + 'static) {
        let normalized = query.normalized();
        let storage = self.inner.storage.clone();
        let pending = Mutex::new(Some(callback));

        self.inner.scheduler.fetch(
            &self.count_path(query),
            Arc::new(move |response: &Value| {
                let Some(total) = response.get("total_count").and_then(Value::as_u64) else {
                    log::warn!("Count response for {} has no total_count", normalized);
                    return;
                };
                let total = total as usize;
                storage.put_json(&normalized, &total);
                if let Some(callback) = pending.lock().ok().and_then(|mut slot| slot.take()) {
                    callback(total);
                }
            }),
        );
    }

    /// Returns the last persisted total for `query`.
    pub fn cached_total(&self, query: &Query) -> Option<usize> {
        self.inner.storage.get_json(&query.normalized())
    }

    /// Allocates a fresh [`WaiterId`].
    pub fn waiter(&self) -> WaiterId {
        self.inner.next_waiter.fetch_add(1, Ordering::Relaxed)
    }

    /// Fetches the record at `index` of `query`'s result set.
    ///
    /// Cached records are delivered before this returns. Otherwise `callback`
    /// waits for the owning block; every caller gets exactly one invocation.
    pub fn get_record(
        &self,
        query: &Query,
        index: usize,
        callback: impl FnOnce(Value) + Send + 'static,
    ) {
        self.get_record_as(self.waiter(), query, index, callback);
    }

    /// Like [`get_record`](Self::get_record), on behalf of `waiter`.
    ///
    /// If `waiter` is already waiting for this record, `callback` replaces the
    /// earlier callback, which is dropped without being invoked.
    pub fn get_record_as(
        &self,
        waiter: WaiterId,
        query: &Query,
        index: usize,
        callback: impl FnOnce(Value) + Send + 'static,
    ) {
        let normalized = query.normalized();
        if let Some(record) = self
            .inner
            .storage
            .get_json::<Value>(&record_key(&normalized, index))
        {
            callback(record);
            return;
        }

        let callback: RecordCallback = Box::new(callback);
        if let Ok(mut table) = self.inner.callbacks.lock() {
            let waiting = table.entry(normalized).or_default().entry(index).or_default();
            match waiting.iter_mut().find(|(id, _)| *id == waiter) {
                Some((_, slot)) => *slot = callback,
                None => waiting.push((waiter, callback)),
            }
        }

        let block = Block::containing(index, self.block_size());
        let weak: Weak<RecordStoreInner> = Arc::downgrade(&self.inner);
        let owner = query.clone();

        self.inner.scheduler.fetch(
            &self.block_path(query, block),
            Arc::new(move |response: &Value| {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver_block(&owner, block, response);
                }
            }),
        );
    }

    /// Fetches the complete, unpaginated result array for `query`.
    ///
    /// Used for small aggregate queries such as per-term match counts.
    pub fn all_records(&self, query: &Query, callback: impl FnOnce(Vec<Value>) + Send + 'static) {
        let pending = Mutex::new(Some(callback));
        let path = query.request_path();
        let label = path.clone();

        self.inner.scheduler.fetch(
            &path,
            Arc::new(move |response: &Value| {
                let Some(results) = response.get("results").and_then(Value::as_array) else {
                    log::warn!("Response for {} has no results", label);
                    return;
                };
                if let Some(callback) = pending.lock().ok().and_then(|mut slot| slot.take()) {
                    callback(results.clone());
                }
            }),
        );
    }

    /// Drops the callback `waiter` registered for `index` of the query whose
    /// normalized form is `normalized`.
    pub fn release(&self, normalized: &str, index: usize, waiter: WaiterId) {
        let Ok(mut table) = self.inner.callbacks.lock() else {
            return;
        };
        let Some(by_index) = table.get_mut(normalized) else {
            return;
        };
        if let Some(waiting) = by_index.get_mut(&index) {
            waiting.retain(|(id, _)| *id != waiter);
            if waiting.is_empty() {
                by_index.remove(&index);
            }
        }
        if by_index.is_empty() {
            table.remove(normalized);
        }
    }

    /// Number of callers still waiting on records of `query`.
    pub fn waiting(&self, query: &Query) -> usize {
        self.inner
            .callbacks
            .lock()
            .ok()
            .and_then(|table| {
                table
                    .get(&query.normalized())
                    .map(|by_index| by_index.values().map(Vec::len).sum())
            })
            .unwrap_or(0)
    }
}

impl RecordStoreInner {
    fn deliver_block(&self, query: &Query, block: Block, response: &Value) {
        let Some(records) = response.get("results").and_then(Value::as_array) else {
            log::warn!("Block {} of {} has no results", block.index, query);
            return;
        };

        let normalized = query.normalized();
        for (position, record) in records.iter().take(block.size).enumerate() {
            let index = block.absolute(position);
            self.storage.put_json(&record_key(&normalized, index), record);
            for (_, callback) in self.take_callbacks(&normalized, index) {
                callback(record.clone());
            }
        }
    }

    fn take_callbacks(&self, normalized: &str, index: usize) -> Vec<(WaiterId, RecordCallback)> {
        let Ok(mut table) = self.callbacks.lock() else {
            return Vec::new();
        };
        let Some(by_index) = table.get_mut(normalized) else {
            return Vec::new();
        };
        let taken = by_index.remove(&index).unwrap_or_default();
        if by_index.is_empty() {
            table.remove(normalized);
        }
        taken
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("config", &self.inner.config)
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}
