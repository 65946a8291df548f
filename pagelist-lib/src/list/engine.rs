//! The windowing engine.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::time::Instant;

use super::ListConfig;
use super::RowElement;
use super::RowRenderer;
use super::RowSlots;
use super::Viewport;
use super::VisibleRange;
use super::compute_visible_range;
use crate::error::ListError;
use crate::query::Query;
use crate::records::RecordStore;
use crate::storage::scroll_key;

/// Observer told the total item count whenever the list initializes.
pub type ItemCountObserver = Arc<dyn Fn(usize) + Send + Sync>;

/// What one render pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Rows created for indices that had none.
    pub created: usize,
    /// Placeholder rows re-rendered in place.
    pub refreshed: usize,
    /// Rows dropped because they left the window.
    pub evicted: usize,
}

struct ListState<E> {
    query: Option<Query>,
    total_items: usize,
    slots: RowSlots<E>,
    /// Bumped whenever the live rows are discarded wholesale.
    generation: u64,
}

/// A fixed-row-height list that keeps only the visible window of rows live.
///
/// The list owns a [`Viewport`], asks its [`RowRenderer`] for rows as they
/// scroll into view, and persists the scroll offset under its id so it
/// survives re-queries and restarts.
///
/// Cheap to clone; clones drive the same list.
///
/// # Example
///
/// ```ignore
/// let list = VirtualList::new(
///     "results",
///     viewport.clone(),
///     StoreRowRenderer::new(client.records().clone()),
///     client.records().clone(),
///     ListConfig::default().with_row_height(60.0),
/// );
/// list.on_total_changed(|total| println!("{total} Items"));
/// list.update_query(Query::new().with("searchstring", "tea"))?;
///
/// // host scroll event
/// list.on_scroll()?;
/// // host animation frame
/// list.on_frame()?;
/// ```
pub struct VirtualList<R: RowRenderer> {
    inner: Arc<ListInner<R>>,
}

struct ListInner<R: RowRenderer> {
    id: String,
    scroll_key: String,
    viewport: Arc<dyn Viewport>,
    renderer: R,
    store: RecordStore,
    config: ListConfig,
    state: Mutex<ListState<R::Row>>,
    ticking: AtomicBool,
    observer: RwLock<Option<ItemCountObserver>>,
}

impl<R: RowRenderer> VirtualList<R> {
    /// Creates a list with no query and no rows.
    ///
    /// Nothing is rendered until [`update_query`](Self::update_query) or
    /// [`init`](Self::init) is called.
    pub fn new(
        id: impl Into<String>,
        viewport: Arc<dyn Viewport>,
        renderer: R,
        store: RecordStore,
        config: ListConfig,
    ) -> Self {
        let id = id.into();
        Self {
            inner: Arc::new(ListInner {
                scroll_key: scroll_key(&id),
                id,
                viewport,
                renderer,
                store,
                config,
                state: Mutex::new(ListState {
                    query: None,
                    total_items: 0,
                    slots: RowSlots::new(),
                    generation: 0,
                }),
                ticking: AtomicBool::new(false),
                observer: RwLock::new(None),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &ListConfig {
        &self.inner.config
    }

    pub fn query(&self) -> Option<Query> {
        self.inner.state().query.clone()
    }

    pub fn total_items(&self) -> usize {
        self.inner.state().total_items
    }

    /// Height of the scroll content: `total_items * row_height`.
    pub fn content_height(&self) -> f64 {
        self.total_items() as f64 * self.inner.config.row_height
    }

    /// Number of live rows.
    pub fn live_rows(&self) -> usize {
        self.inner.state().slots.len()
    }

    /// The live row at `index`.
    pub fn row(&self, index: usize) -> Option<R::Row> {
        self.inner
            .state()
            .slots
            .get(index)
            .map(|slot| slot.element.clone())
    }

    /// Every live row in index order.
    pub fn rows(&self) -> Vec<(usize, R::Row)> {
        self.inner
            .state()
            .slots
            .iter()
            .map(|(index, slot)| (index, slot.element.clone()))
            .collect()
    }

    /// Registers the observer told the item count on every [`init`](Self::init).
    pub fn on_total_changed(&self, observer: impl Fn(usize) + Send + Sync + 'static) {
        if let Ok(mut guard) = self.inner.observer.write() {
            *guard = Some(Arc::new(observer));
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Discards every row, sizes the content, restores the persisted scroll
    /// offset, starts listening for scroll events and renders the window.
    pub fn init(&self) -> Result<RenderStats, ListError> {
        self.inner.init()
    }

    /// The index window for the current scroll offset, or `None` when empty.
    pub fn visible_range(&self) -> Option<VisibleRange> {
        let total = self.total_items();
        self.inner.range_for(total)
    }

    /// Brings the live rows in line with the current window.
    pub fn render_visible_items(&self) -> Result<RenderStats, ListError> {
        self.inner.render_visible_items()
    }

    /// Handles a scroll event: persists the offset and requests a frame if
    /// none is pending.
    pub fn on_scroll(&self) -> Result<(), ListError> {
        self.inner.on_scroll()
    }

    /// Handles a requested frame.
    pub fn on_frame(&self) -> Result<RenderStats, ListError> {
        self.inner.ticking.store(false, Ordering::SeqCst);
        self.inner.render_visible_items()
    }

    /// Switches the list to `query`.
    ///
    /// For a different query the live rows are discarded at once and the
    /// total falls back to the last persisted total for that query, or zero.
    /// The real total is then fetched; when it arrives the persisted offset
    /// is reset to the top and the list re-initializes. A total arriving
    /// after yet another query change is ignored. For the same query the
    /// persisted offset is restored and the window re-rendered.
    pub fn update_query(&self, query: Query) -> Result<(), ListError> {
        let inner = &self.inner;
        inner.ensure_attached()?;

        let discarded = {
            let mut state = inner.state();
            if state.query.as_ref().is_some_and(|q| q.same_as(&query)) {
                None
            } else {
                state.query = Some(query.clone());
                state.total_items = inner.store.cached_total(&query).unwrap_or(0);
                state.generation += 1;
                Some((state.slots.drain(), state.total_items))
            }
        };

        let Some((discarded, total)) = discarded else {
            inner.restore_scroll_offset();
            inner.render_visible_items()?;
            return Ok(());
        };
        inner.discard(discarded);
        inner
            .viewport
            .set_content_size(total as f64 * inner.config.row_height);

        log::debug!("List {} switching to {}", inner.id, query);
        let list = Arc::downgrade(&self.inner);
        let normalized = query.normalized();
        inner.store.get_total(&query, move |total| {
            if let Some(inner) = list.upgrade() {
                inner.apply_total(&normalized, total);
            }
        });
        Ok(())
    }

    /// Re-initializes the list if `total` differs from the current total.
    pub fn update_total_items(&self, total: usize) -> Result<(), ListError> {
        {
            let mut state = self.inner.state();
            if state.total_items == total {
                return Ok(());
            }
            state.total_items = total;
        }
        self.inner.init().map(|_| ())
    }

    /// Scrolls so that `index` is at the top of the viewport.
    pub fn scroll_to_index(&self, index: usize) -> Result<(), ListError> {
        self.inner.ensure_attached()?;
        self.inner
            .viewport
            .set_scroll_offset(index as f64 * self.inner.config.row_height);
        self.inner.on_scroll()
    }

    /// Stops listening for scroll events and detaches every row.
    pub fn destroy(&self) {
        let inner = &self.inner;
        inner.viewport.listen_scroll(false);
        inner.ticking.store(false, Ordering::SeqCst);
        let discarded = {
            let mut state = inner.state();
            state.generation += 1;
            state.slots.drain()
        };
        inner.discard(discarded);
    }
}

impl<R: RowRenderer> ListInner<R> {
    fn state(&self) -> MutexGuard<'_, ListState<R::Row>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_attached(&self) -> Result<(), ListError> {
        if self.viewport.is_attached() {
            return Ok(());
        }
        log::error!("Container for list {} is missing", self.id);
        Err(ListError::container_missing(&self.id))
    }

    fn range_for(&self, total: usize) -> Option<VisibleRange> {
        compute_visible_range(
            self.viewport.scroll_offset(),
            self.viewport.viewport_size(),
            self.config.row_height,
            total,
            self.config.buffer,
        )
    }

    fn restore_scroll_offset(&self) {
        let offset = self
            .store
            .storage()
            .get_json::<f64>(&self.scroll_key)
            .unwrap_or(0.0);
        self.viewport.set_scroll_offset(offset);
    }

    fn init(&self) -> Result<RenderStats, ListError> {
        self.ensure_attached()?;

        let (discarded, total) = {
            let mut state = self.state();
            state.generation += 1;
            (state.slots.drain(), state.total_items)
        };
        let dropped = discarded.len();
        self.discard(discarded);

        self.viewport
            .set_content_size(total as f64 * self.config.row_height);
        self.restore_scroll_offset();
        self.viewport.listen_scroll(true);

        let mut stats = self.render_visible_items()?;
        stats.evicted += dropped;
        self.notify_item_count(total);
        Ok(stats)
    }

    fn render_visible_items(&self) -> Result<RenderStats, ListError> {
        self.ensure_attached()?;

        let now = Instant::now();
        let row_height = self.config.row_height;
        let mut stats = RenderStats::default();

        let (generation, query, work, evicted) = {
            let mut state = self.state();
            let range = self.range_for(state.total_items);
            let evicted = match range {
                Some(range) if self.config.evict_outside_range => state.slots.retain_range(range),
                Some(_) => Vec::new(),
                None => state.slots.drain(),
            };

            let mut work = Vec::new();
            for index in range.iter().flat_map(VisibleRange::indices) {
                match state.slots.get(index) {
                    None => work.push((index, None)),
                    Some(slot)
                        if slot.element.is_loading()
                            && now.duration_since(slot.rendered_at) >= self.config.stale_after =>
                    {
                        work.push((index, Some(slot.element.clone())));
                    }
                    Some(_) => {}
                }
            }
            (state.generation, state.query.clone().unwrap_or_default(), work, evicted)
        };

        stats.evicted = evicted.len();
        self.discard(evicted);

        let rendered: Vec<_> = work
            .into_iter()
            .map(|(index, existing)| {
                let refreshed = existing.is_some();
                let row = self.renderer.render(index, &query, existing.as_ref());
                row.place(index as f64 * row_height, row_height);
                (index, row, refreshed)
            })
            .collect();

        let mut state = self.state();
        if state.generation != generation {
            drop(state);
            log::debug!("List {} was reset during render; dropping rows", self.id);
            self.discard(rendered.into_iter().map(|(index, row, _)| (index, row)));
            return Ok(stats);
        }
        let mut replaced = Vec::new();
        for (index, row, refreshed) in rendered {
            if refreshed {
                stats.refreshed += 1;
            } else {
                stats.created += 1;
            }
            // A concurrent pass may have filled the slot first.
            if let Some(old) = state.slots.insert(index, row.clone(), now)
                && !old.same_row(&row)
            {
                replaced.push((index, old));
            }
        }
        drop(state);
        self.discard(replaced);
        Ok(stats)
    }

    fn on_scroll(&self) -> Result<(), ListError> {
        self.ensure_attached()?;
        let offset = self.viewport.scroll_offset();
        self.store.storage().put_json(&self.scroll_key, &offset);
        if !self.ticking.swap(true, Ordering::SeqCst) {
            self.viewport.request_frame();
        }
        Ok(())
    }

    fn apply_total(&self, normalized: &str, total: usize) {
        {
            let mut state = self.state();
            let current = state
                .query
                .as_ref()
                .is_some_and(|q| q.normalized() == normalized);
            if !current {
                log::debug!("List {} ignoring total for a superseded query", self.id);
                return;
            }
            state.total_items = total;
        }

        self.store.storage().put_json(&self.scroll_key, &0.0);
        if let Err(e) = self.init() {
            log::warn!("List {} could not re-initialize: {}", self.id, e);
        }
    }

    /// Releases and detaches rows that are no longer live.
    fn discard(&self, rows: impl IntoIterator<Item = (usize, R::Row)>) {
        for (_, row) in rows {
            self.renderer.release(&row);
            row.detach();
        }
    }

    fn notify_item_count(&self, total: usize) {
        let observer = self.observer.read().ok().and_then(|guard| guard.clone());
        if let Some(observer) = observer {
            observer(total);
        }
    }
}


impl<R: RowRenderer> Clone for VirtualList<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RowRenderer> std::fmt::Debug for VirtualList<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("VirtualList")
            .field("id", &self.inner.id)
            .field("total_items", &state.total_items)
            .field("live_rows", &state.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::ApiError;
    use crate::list::HeadlessViewport;
    use crate::list::RecordRow;
    use crate::list::StoreRowRenderer;
    use crate::records::RecordStoreConfig;
    use crate::scheduler::RequestScheduler;
    use crate::scheduler::SchedulerConfig;
    use crate::storage::PersistentStore;
    use crate::testing::MockTransport;
    use crate::testing::collection_response;
    use crate::testing::params;

    struct Fixture {
        list: VirtualList<StoreRowRenderer>,
        viewport: Arc<HeadlessViewport>,
        store: RecordStore,
    }

    fn fixture(transport: Arc<MockTransport>, config: ListConfig) -> Fixture {
        let store = RecordStore::new(
            RequestScheduler::new(transport, SchedulerConfig::default()),
            PersistentStore::in_memory(),
            RecordStoreConfig::default().with_block_size(50),
        );
        let viewport = Arc::new(HeadlessViewport::new(960.0));
        let list = VirtualList::new(
            "results",
            viewport.clone(),
            StoreRowRenderer::new(store.clone()),
            store.clone(),
            config,
        );
        Fixture {
            list,
            viewport,
            store,
        }
    }

    fn indices(list: &VirtualList<StoreRowRenderer>) -> Vec<usize> {
        list.rows().into_iter().map(|(index, _)| index).collect()
    }

    fn search(query: &str) -> Query {
        Query::new()
            .with("query", "collectionset")
            .with("searchstring", query)
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_follows_scroll() {
        let f = fixture(MockTransport::collection(1000, Duration::ZERO), ListConfig::default());
        f.list.update_query(search("tea")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(f.list.total_items(), 1000);
        assert_eq!(f.viewport.content_size(), 80_000.0);
        assert_eq!(f.list.content_height(), 80_000.0);
        assert_eq!(indices(&f.list), (0..=32).collect::<Vec<_>>());

        f.viewport.set_scroll_offset(8_000.0);
        f.list.on_scroll().unwrap();
        f.list.on_scroll().unwrap();
        assert_eq!(f.viewport.frames_requested(), 1);

        let stats = f.list.on_frame().unwrap();
        assert_eq!(
            stats,
            RenderStats {
                created: 53,
                refreshed: 0,
                evicted: 33
            }
        );
        assert_eq!(indices(&f.list), (80..=132).collect::<Vec<_>>());
        for (index, row) in f.list.rows() {
            assert_eq!(row.top(), index as f64 * 80.0);
            assert_eq!(row.height(), 80.0);
            assert!(row.is_attached());
        }
        assert_eq!(
            f.store.storage().get_json::<f64>(&scroll_key("results")),
            Some(8_000.0)
        );

        // Near the end the window is clamped to the last row.
        f.viewport.set_scroll_offset(1e9);
        f.list.on_scroll().unwrap();
        assert_eq!(f.viewport.frames_requested(), 2);
        f.list.on_frame().unwrap();
        assert_eq!(indices(&f.list), (968..=999).collect::<Vec<_>>());

        tokio::time::sleep(Duration::from_millis(10)).await;
        let last = f.list.row(999).unwrap();
        assert_eq!(last.record().unwrap()["index"], json!(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_count_observer() {
        let f = fixture(MockTransport::collection(321, Duration::ZERO), ListConfig::default());
        let counts = Arc::new(Mutex::new(Vec::new()));
        let seen = counts.clone();
        f.list.on_total_changed(move |total| seen.lock().unwrap().push(total));

        f.list.update_query(search("tea")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*counts.lock().unwrap(), vec![321]);
        assert_eq!(f.viewport.content_size(), 321.0 * 80.0);

        f.list.update_total_items(321).unwrap();
        f.list.update_total_items(10).unwrap();
        assert_eq!(*counts.lock().unwrap(), vec![321, 10]);
        assert_eq!(f.viewport.content_size(), 800.0);
        assert_eq!(indices(&f.list), (0..=9).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_placeholder_refreshed_in_place() {
        let transport = MockTransport::new(|path| {
            if params(path)["query"] == "collectionsetcount" {
                Ok(collection_response(path, 100))
            } else {
                Err(ApiError::http(503, "cold"))
            }
        });
        let f = fixture(transport, ListConfig::default().with_buffer(0));
        f.list.update_query(search("tea")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let before: Vec<RecordRow> = f.list.rows().into_iter().map(|(_, row)| row).collect();
        assert_eq!(before.len(), 13);
        assert!(before.iter().all(|row| row.is_loading()));

        // Too young to refresh.
        assert_eq!(f.list.render_visible_items().unwrap(), RenderStats::default());

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let stats = f.list.render_visible_items().unwrap();
        assert_eq!(stats.refreshed, 13);
        assert_eq!(stats.created, 0);

        let after: Vec<RecordRow> = f.list.rows().into_iter().map(|(_, row)| row).collect();
        for (old, new) in before.iter().zip(&after) {
            assert!(old.same_row(new));
        }

        // Re-stamped, so not refreshed again right away.
        assert_eq!(f.list.render_visible_items().unwrap().refreshed, 0);
        // One waiting callback per live row, however often it was refreshed.
        assert_eq!(f.store.waiting(&search("tea")), 13);

        // Evicted rows stop waiting.
        f.viewport.set_scroll_offset(4_000.0);
        f.list.render_visible_items().unwrap();
        assert_eq!(f.store.waiting(&search("tea")), 13);
        f.list.destroy();
        assert_eq!(f.store.waiting(&search("tea")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_query_does_not_render_over_old_total() {
        let transport = MockTransport::with_delay(Duration::from_millis(500), |path| {
            let total = if params(path)["searchstring"] == "a" { 1000 } else { 5 };
            Ok(collection_response(path, total))
        });
        let f = fixture(transport, ListConfig::default());
        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.list.total_items(), 1000);

        f.list.update_query(search("b")).unwrap();
        assert_eq!(f.list.total_items(), 0);
        assert_eq!(f.viewport.content_size(), 0.0);
        f.viewport.set_scroll_offset(800.0);
        f.list.on_scroll().unwrap();
        f.list.on_frame().unwrap();
        assert_eq!(f.list.live_rows(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.list.total_items(), 5);
        assert_eq!(indices(&f.list), (0..=4).collect::<Vec<_>>());
        assert_eq!(f.store.waiting(&search("b")), 0);

        // A query seen before starts from its persisted total.
        f.list.update_query(search("a")).unwrap();
        assert_eq!(f.list.total_items(), 1000);
        assert_eq!(f.viewport.content_size(), 80_000.0);
    }

    #[derive(Clone)]
    struct TestRow {
        attached: Arc<AtomicBool>,
    }

    impl RowElement for TestRow {
        fn is_loading(&self) -> bool {
            false
        }

        fn same_row(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.attached, &other.attached)
        }

        fn place(&self, _top: f64, _height: f64) {
            self.attached.store(true, Ordering::SeqCst);
        }

        fn detach(&self) {
            self.attached.store(false, Ordering::SeqCst);
        }
    }

    /// Holds every render at a barrier once armed, so two passes overlap.
    struct GatedRenderer {
        armed: AtomicBool,
        gate: std::sync::Barrier,
        created: Mutex<Vec<TestRow>>,
    }

    impl RowRenderer for GatedRenderer {
        type Row = TestRow;

        fn render(&self, _index: usize, _query: &Query, _existing: Option<&TestRow>) -> TestRow {
            let row = TestRow {
                attached: Arc::new(AtomicBool::new(false)),
            };
            self.created.lock().unwrap().push(row.clone());
            if self.armed.load(Ordering::SeqCst) {
                self.gate.wait();
            }
            row
        }
    }

    #[test]
    fn test_overlapping_renders_keep_one_live_row_per_index() {
        let store = RecordStore::new(
            RequestScheduler::new(MockTransport::new(|_| Ok(json!({}))), SchedulerConfig::default()),
            PersistentStore::in_memory(),
            RecordStoreConfig::default(),
        );
        let viewport = Arc::new(HeadlessViewport::new(80.0));
        let renderer = GatedRenderer {
            armed: AtomicBool::new(false),
            gate: std::sync::Barrier::new(2),
            created: Mutex::new(Vec::new()),
        };
        let list = VirtualList::new(
            "overlap",
            viewport.clone(),
            renderer,
            store,
            ListConfig::default().with_buffer(0),
        );
        list.update_total_items(3).unwrap();
        assert_eq!(list.live_rows(), 2);

        viewport.set_scroll_offset(160.0);
        list.inner.renderer.armed.store(true, Ordering::SeqCst);
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| list.render_visible_items().unwrap());
            }
        });

        let live = list.rows();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, 2);
        let created = list.inner.renderer.created.lock().unwrap();
        let attached: Vec<&TestRow> = created
            .iter()
            .filter(|row| row.attached.load(Ordering::SeqCst))
            .collect();
        assert_eq!(attached.len(), 1);
        assert!(attached[0].same_row(&live[0].1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_query_block_leaves_new_rows_alone() {
        let f = fixture(
            MockTransport::collection(1000, Duration::from_secs(1)),
            ListConfig::default(),
        );

        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        let old_rows: Vec<RecordRow> = f.list.rows().into_iter().map(|(_, row)| row).collect();
        assert_eq!(old_rows.len(), 33);

        // Block 0 of "a" is still in flight.
        f.list.update_query(search("b")).unwrap();
        assert_eq!(f.list.live_rows(), 0);
        assert!(old_rows.iter().all(|row| !row.is_attached()));

        // "a" lands at 2.0s, the total for "b" at 2.1s.
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert!(old_rows.iter().all(|row| !row.is_loading()));
        let b = search("b").normalized();
        for (_, row) in f.list.rows() {
            assert_eq!(row.query(), Some(b.clone()));
            assert!(row.is_loading());
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.list.live_rows(), 33);
        for (index, row) in f.list.rows() {
            let record = row.record().unwrap();
            assert_eq!(record["search"], "b");
            assert_eq!(record["index"], json!(index));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_total_for_superseded_query_is_ignored() {
        let f = fixture(
            MockTransport::collection(1000, Duration::from_secs(1)),
            ListConfig::default(),
        );
        let counts = Arc::new(Mutex::new(Vec::new()));
        let seen = counts.clone();
        f.list.on_total_changed(move |total| seen.lock().unwrap().push(total));

        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        f.list.update_query(search("b")).unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        // Only the total for "a" has arrived, and it was dropped.
        assert!(counts.lock().unwrap().is_empty());
        assert_eq!(f.list.live_rows(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*counts.lock().unwrap(), vec![1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_offset_persistence() {
        let f = fixture(MockTransport::collection(1000, Duration::ZERO), ListConfig::default());
        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        f.viewport.set_scroll_offset(4_000.0);
        f.list.on_scroll().unwrap();

        // Same query: the persisted offset is restored.
        f.viewport.set_scroll_offset(0.0);
        f.list.update_query(search("a")).unwrap();
        assert_eq!(f.viewport.scroll_offset(), 4_000.0);
        assert!(f.list.row(50).is_some());

        // New query: back to the top.
        f.list.update_query(search("b")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.viewport.scroll_offset(), 0.0);
        assert_eq!(
            f.store.storage().get_json::<f64>(&scroll_key("results")),
            Some(0.0)
        );
        assert_eq!(indices(&f.list), (0..=32).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_to_index() {
        let f = fixture(MockTransport::collection(1000, Duration::ZERO), ListConfig::default());
        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        f.list.scroll_to_index(500).unwrap();
        assert_eq!(f.viewport.scroll_offset(), 40_000.0);
        assert_eq!(f.viewport.frames_requested(), 1);
        f.list.on_frame().unwrap();
        assert!(f.list.visible_range().unwrap().contains(500));
        assert!(f.list.row(500).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_kept_when_eviction_disabled() {
        let f = fixture(
            MockTransport::collection(1000, Duration::ZERO),
            ListConfig::default().with_evict_outside_range(false),
        );
        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        f.viewport.set_scroll_offset(8_000.0);
        let stats = f.list.render_visible_items().unwrap();
        assert_eq!(stats.evicted, 0);
        assert_eq!(f.list.live_rows(), 33 + 53);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container() {
        let f = fixture(MockTransport::collection(10, Duration::ZERO), ListConfig::default());
        f.viewport.detach();

        assert!(matches!(
            f.list.update_query(search("a")),
            Err(ListError::ContainerMissing { .. })
        ));
        assert!(f.list.init().is_err());
        assert!(f.list.on_scroll().is_err());
        assert!(f.list.render_visible_items().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy() {
        let f = fixture(MockTransport::collection(1000, Duration::ZERO), ListConfig::default());
        f.list.update_query(search("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.viewport.is_listening());
        let rows = f.list.rows();

        f.list.destroy();
        assert!(!f.viewport.is_listening());
        assert_eq!(f.list.live_rows(), 0);
        assert!(rows.iter().all(|(_, row)| !row.is_attached()));
    }
}
