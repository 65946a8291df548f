//! Row elements and the renderers that fill them.

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde_json::Value;

use crate::query::Query;
use crate::records::RecordStore;
use crate::records::WaiterId;

/// A UI element bound to one row.
///
/// Elements are handles: clones refer to the same row, so a renderer may keep
/// a clone and fill it in later.
pub trait RowElement: Clone + Send + Sync + 'static {
    /// Whether the row still shows its loading placeholder.
    fn is_loading(&self) -> bool;

    /// Positions the row inside the scroll content.
    fn place(&self, top: f64, height: f64);

    /// Whether `other` is a handle to the same row.
    fn same_row(&self, other: &Self) -> bool;

    /// Removes the row from the scroll content.
    fn detach(&self) {}
}

/// Produces row elements for a list.
///
/// `existing` is the element already live at `index` when a stale placeholder
/// is being refreshed. Renderers must tolerate being called twice for the
/// same element.
pub trait RowRenderer: Send + Sync + 'static {
    type Row: RowElement;

    fn render(&self, index: usize, query: &Query, existing: Option<&Self::Row>) -> Self::Row;

    /// Called when `row` leaves the list for good, before it is detached.
    fn release(&self, _row: &Self::Row) {}
}

#[derive(Debug, Clone, Default)]
struct RowState {
    binding: Option<(String, usize)>,
    waiter: Option<WaiterId>,
    record: Option<Value>,
    top: f64,
    height: f64,
    attached: bool,
}

/// Row element holding one record, or a placeholder until it arrives.
#[derive(Debug, Clone, Default)]
pub struct RecordRow {
    state: Arc<RwLock<RowState>>,
}

impl RecordRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the row is bound to.
    pub fn index(&self) -> Option<usize> {
        self.read(|s| s.binding.as_ref().map(|(_, index)| *index))
    }

    /// Normalized query the row is bound to.
    pub fn query(&self) -> Option<String> {
        self.read(|s| s.binding.as_ref().map(|(query, _)| query.clone()))
    }

    /// The loaded record, if any.
    pub fn record(&self) -> Option<Value> {
        self.read(|s| s.record.clone())
    }

    pub fn top(&self) -> f64 {
        self.read(|s| s.top)
    }

    pub fn height(&self) -> f64 {
        self.read(|s| s.height)
    }

    pub fn is_attached(&self) -> bool {
        self.read(|s| s.attached)
    }

    /// Binds the row to `(query, index)` and resets it to the placeholder.
    fn bind(&self, query: &str, index: usize) {
        self.write(|s| {
            s.binding = Some((query.to_string(), index));
            s.record = None;
        });
    }

    fn waiter(&self, store: &RecordStore) -> WaiterId {
        self.write(|s| *s.waiter.get_or_insert_with(|| store.waiter()))
    }

    fn is_bound_to(&self, query: &str, index: usize) -> bool {
        self.read(|s| {
            s.binding
                .as_ref()
                .is_some_and(|(q, i)| q == query && *i == index)
        })
    }

    /// Fills the row unless it has been rebound since the request was made.
    fn fill(&self, query: &str, index: usize, record: Value) {
        self.write(|s| match &s.binding {
            Some((q, i)) if q == query && *i == index => s.record = Some(record),
            _ => log::debug!("Dropping record {} for a rebound row", index),
        });
    }

    fn read<T>(&self, f: impl FnOnce(&RowState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut RowState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RowElement for RecordRow {
    fn is_loading(&self) -> bool {
        self.read(|s| s.record.is_none())
    }

    fn same_row(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn place(&self, top: f64, height: f64) {
        self.write(|s| {
            s.top = top;
            s.height = height;
            s.attached = true;
        });
    }

    fn detach(&self) {
        self.write(|s| s.attached = false);
    }
}

/// Renders [`RecordRow`]s from a [`RecordStore`].
///
/// New rows start as placeholders and are filled when their block lands.
/// Cached records fill the row before `render` returns.
#[derive(Debug, Clone)]
pub struct StoreRowRenderer {
    store: RecordStore,
}

impl StoreRowRenderer {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }
}

impl RowRenderer for StoreRowRenderer {
    type Row = RecordRow;

    fn render(&self, index: usize, query: &Query, existing: Option<&RecordRow>) -> RecordRow {
        let normalized = query.normalized();
        let row = existing.cloned().unwrap_or_default();

        if row.is_bound_to(&normalized, index) && !row.is_loading() {
            return row;
        }
        if !row.is_bound_to(&normalized, index) {
            self.release(&row);
            row.bind(&normalized, index);
        }

        let waiter = row.waiter(&self.store);
        let target = row.clone();
        self.store.get_record_as(waiter, query, index, move |record| {
            target.fill(&normalized, index, record);
        });
        row
    }

    fn release(&self, row: &RecordRow) {
        let pending = row.read(|s| match (&s.binding, s.waiter) {
            (Some((query, index)), Some(waiter)) if s.record.is_none() => {
                Some((query.clone(), *index, waiter))
            }
            _ => None,
        });
        if let Some((query, index, waiter)) = pending {
            self.store.release(&query, index, waiter);
        }
    }
}
