//! Item state store
//!
//! Two layers: confirmed items, and a pending overlay of optimistic changes
//! that have not been confirmed yet. Readers see the overlay on top of the
//! confirmed layer. Rolling back is discarding the overlay.
//!
//! Both layers are persistent maps, so cloning the store for a snapshot is
//! constant time.

use chrono::{DateTime, Utc};
use im::{OrdMap, OrdSet};
use retrace_command::{CommandError, Effect};
use retrace_model::{Item, ItemId, ItemSource, PendingChange, PendingItem};
use serde::Serialize;

/// Counters over the visible list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Visible items
    pub total: usize,
    /// Visible completed items
    pub completed: usize,
    /// Visible open items
    pub active: usize,
    /// Items with an unconfirmed change
    pub pending: usize,
}

/// Confirmed items plus the optimistic overlay
#[derive(Debug, Clone)]
pub struct ItemStateStore {
    items: OrdMap<ItemId, Item>,
    pending: OrdMap<ItemId, PendingItem>,
    selected: OrdSet<ItemId>,
    loading: bool,
    last_error: Option<CommandError>,
    last_updated: DateTime<Utc>,
}

impl ItemStateStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: OrdMap::new(),
            pending: OrdMap::new(),
            selected: OrdSet::new(),
            loading: false,
            last_error: None,
            last_updated: Utc::now(),
        }
    }

    /// Store holding `items` as confirmed state
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut store = Self::new();
        store.replace_confirmed(items);
        store
    }

    // ---- reads ----

    /// Confirmed layer
    #[inline]
    #[must_use]
    pub fn confirmed(&self) -> &OrdMap<ItemId, Item> {
        &self.items
    }

    /// Pending overlay
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &OrdMap<ItemId, PendingItem> {
        &self.pending
    }

    /// Selected ids
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &OrdSet<ItemId> {
        &self.selected
    }

    /// Whether a full fetch is running
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Most recent failure, cleared by the next success
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<&CommandError> {
        self.last_error.as_ref()
    }

    /// Time of the last confirmed change
    #[inline]
    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Item as a reader sees it: pending state first, then confirmed
    #[must_use]
    pub fn visible(&self, id: &ItemId) -> Option<&Item> {
        match self.pending.get(id) {
            Some(pending) if pending.is_removal() => None,
            Some(pending) => Some(&pending.item),
            None => self.items.get(id),
        }
    }

    /// True if `id` is visible
    #[inline]
    #[must_use]
    pub fn contains_visible(&self, id: &ItemId) -> bool {
        self.visible(id).is_some()
    }

    /// True if `id` has an unconfirmed change
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: &ItemId) -> bool {
        self.pending.contains_key(id)
    }

    /// Visible items in display order
    #[must_use]
    pub fn visible_items(&self) -> Vec<Item> {
        let mut out: Vec<Item> = self
            .items
            .iter()
            .filter(|(id, _)| !self.pending.contains_key(*id))
            .map(|(_, item)| item.clone())
            .chain(
                self.pending
                    .values()
                    .filter(|p| !p.is_removal())
                    .map(|p| p.item.clone()),
            )
            .collect();
        out.sort_by(Item::cmp_position);
        out
    }

    /// Counters over the visible list
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let visible = self.visible_items();
        let completed = visible.iter().filter(|i| i.completed).count();
        StoreStats {
            total: visible.len(),
            completed,
            active: visible.len() - completed,
            pending: self.pending.len(),
        }
    }

    /// Order value placing an appended item after every visible one
    #[must_use]
    pub fn next_order(&self, step: i64) -> i64 {
        self.visible_items()
            .last()
            .map_or(step, |last| last.order.saturating_add(step))
    }

    /// Order value that lands `id` at `index` among the other visible items
    ///
    /// Indexes past the end clamp to the end. `None` if `id` is not visible.
    /// When the neighbours leave no room (equal orders, or orders one apart
    /// with an unfavourable id tiebreak) the item lands next to its intended
    /// slot rather than in it; the other items are never renumbered.
    #[must_use]
    pub fn order_for_index(&self, id: &ItemId, index: usize, step: i64) -> Option<i64> {
        if !self.contains_visible(id) {
            return None;
        }
        let others: Vec<Item> = self
            .visible_items()
            .into_iter()
            .filter(|item| &item.id != id)
            .collect();
        let index = index.min(others.len());
        let order = match (index.checked_sub(1).and_then(|i| others.get(i)), others.get(index)) {
            (None, None) => step,
            (None, Some(next)) => next.order.saturating_sub(step),
            (Some(prev), None) => prev.order.saturating_add(step),
            (Some(prev), Some(next)) => order_between(prev, next, id),
        };
        Some(order)
    }

    /// Selected ids that are still visible, in id order
    #[must_use]
    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selected
            .iter()
            .filter(|id| self.contains_visible(id))
            .cloned()
            .collect()
    }

    /// Lookup through the overlay
    #[inline]
    #[must_use]
    pub fn effective(&self) -> Effective<'_> {
        Effective(self)
    }

    // ---- optimistic overlay ----

    /// Stage effects in the pending overlay
    ///
    /// Removing an item that only exists as a pending insert drops the
    /// insert instead of staging a deletion.
    pub fn stage(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Upsert(item) => {
                    let change = if self.items.contains_key(&item.id) {
                        PendingChange::Update
                    } else {
                        PendingChange::Insert
                    };
                    self.pending
                        .insert(item.id.clone(), PendingItem::new(item.clone(), change));
                }
                Effect::Remove(id) => match self.items.get(id) {
                    Some(confirmed) => {
                        let last_known = self
                            .pending
                            .get(id)
                            .map_or_else(|| confirmed.clone(), |p| p.item.clone());
                        self.pending
                            .insert(id.clone(), PendingItem::new(last_known, PendingChange::Delete));
                    }
                    None => {
                        self.pending.remove(id);
                    }
                },
            }
        }
    }

    /// Replace staged projections with canonical effects
    ///
    /// Pending entries for projected ids that the canonical effects no longer
    /// mention are dropped (a create that came back under a server-assigned
    /// id), then the canonical effects are staged.
    pub fn settle(&mut self, projected: &[Effect], canonical: &[Effect]) {
        for effect in projected {
            if !canonical.iter().any(|c| c.id() == effect.id()) {
                self.pending.remove(effect.id());
            }
        }
        self.stage(canonical);
    }

    /// Move the overlay into the confirmed layer
    pub fn promote(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return;
        }
        for (id, entry) in pending {
            if entry.is_removal() {
                self.items.remove(&id);
                self.selected.remove(&id);
            } else {
                self.items.insert(id, entry.item);
            }
        }
        self.last_updated = Utc::now();
    }

    /// Drop the overlay, restoring the confirmed view
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    // ---- bookkeeping ----

    /// Replace the confirmed layer wholesale, dropping pending state
    pub fn replace_confirmed(&mut self, items: impl IntoIterator<Item = Item>) {
        self.items = items.into_iter().map(|item| (item.id.clone(), item)).collect();
        self.pending.clear();
        self.selected = self
            .selected
            .iter()
            .filter(|id| self.items.contains_key(*id))
            .cloned()
            .collect();
        self.last_updated = Utc::now();
    }

    /// Record a failure
    pub fn set_error(&mut self, error: CommandError) {
        self.last_error = Some(error);
    }

    /// Forget the last failure
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set the loading flag
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    // ---- selection ----

    /// Add visible ids to the selection; returns how many were added
    pub fn select(&mut self, ids: &[ItemId]) -> usize {
        let mut added = 0;
        for id in ids {
            if self.contains_visible(id) && self.selected.insert(id.clone()).is_none() {
                added += 1;
            }
        }
        added
    }

    /// Remove ids from the selection
    pub fn deselect(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.selected.remove(id);
        }
    }

    /// Flip selection of one visible id; returns whether it is now selected
    pub fn toggle_selection(&mut self, id: &ItemId) -> bool {
        if self.selected.remove(id).is_some() {
            false
        } else if self.contains_visible(id) {
            self.selected.insert(id.clone());
            true
        } else {
            false
        }
    }

    /// Select every visible item
    pub fn select_all(&mut self) {
        self.selected = self.visible_items().into_iter().map(|item| item.id).collect();
    }

    /// Empty the selection
    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }
}

impl Default for ItemStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-through view of a store: pending overlay first, then confirmed
#[derive(Debug, Clone, Copy)]
pub struct Effective<'a>(&'a ItemStateStore);

impl ItemSource for Effective<'_> {
    fn get_item(&self, id: &ItemId) -> Option<Item> {
        self.0.visible(id).cloned()
    }
}

/// Order placing `id` after `prev` and before `next` in display order
fn order_between(prev: &Item, next: &Item, id: &ItemId) -> i64 {
    // The mean of two i64 values always fits back into i64
    let mid = i64::try_from((i128::from(prev.order) + i128::from(next.order)) / 2)
        .unwrap_or(prev.order);
    let fits = |order: i64| (prev.order, &prev.id) < (order, id) && (order, id) < (next.order, &next.id);
    [mid, prev.order, next.order]
        .into_iter()
        .find(|order| fits(*order))
        .unwrap_or(mid)
}
