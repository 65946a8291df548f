//! Arena of live row elements keyed by index.

use std::collections::BTreeMap;

use tokio::time::Instant;

use super::VisibleRange;

/// A live row and the time it was last rendered.
#[derive(Debug, Clone)]
pub struct Slot<E> {
    pub element: E,
    pub rendered_at: Instant,
}

/// Live rows of one list, at most one per index.
#[derive(Debug, Clone)]
pub struct RowSlots<E> {
    slots: BTreeMap<usize, Slot<E>>,
}

impl<E> Default for RowSlots<E> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }
}

impl<E> RowSlots<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Slot<E>> {
        self.slots.get(&index)
    }

    /// Stores `element` at `index`, returning the element it replaced.
    pub fn insert(&mut self, index: usize, element: E, now: Instant) -> Option<E> {
        self.slots
            .insert(
                index,
                Slot {
                    element,
                    rendered_at: now,
                },
            )
            .map(|slot| slot.element)
    }

    pub fn remove(&mut self, index: usize) -> Option<E> {
        self.slots.remove(&index).map(|slot| slot.element)
    }

    /// Drops every slot outside `range` and returns the dropped elements.
    pub fn retain_range(&mut self, range: VisibleRange) -> Vec<(usize, E)> {
        let mut kept = self.slots.split_off(&range.start);
        let mut above = kept.split_off(&(range.end + 1));
        let mut evicted = std::mem::replace(&mut self.slots, kept);
        evicted.append(&mut above);
        evicted
            .into_iter()
            .map(|(index, slot)| (index, slot.element))
            .collect()
    }

    /// Removes every slot.
    pub fn drain(&mut self) -> Vec<(usize, E)> {
        std::mem::take(&mut self.slots)
            .into_iter()
            .map(|(index, slot)| (index, slot.element))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot<E>)> {
        self.slots.iter().map(|(index, slot)| (*index, slot))
    }
}
