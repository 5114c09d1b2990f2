//! Read-only snapshots for observers

use crate::store::{ItemStateStore, StoreStats};
use chrono::{DateTime, Utc};
use im::{OrdMap, OrdSet};
use retrace_command::CommandError;
use retrace_history::History;
use retrace_model::{Item, ItemId, PendingItem};

/// Immutable snapshot of the engine state
///
/// Cloning is cheap; observers may keep old snapshots around.
#[derive(Debug, Clone, Default)]
pub struct EngineView {
    store: ItemStateStore,
    /// True if an undo entry is available
    pub can_undo: bool,
    /// True if a redo entry is available
    pub can_redo: bool,
    /// Undo entries
    pub undo_depth: usize,
    /// Redo entries
    pub redo_depth: usize,
    /// Description of the command the next undo reverses
    pub last_executed: Option<String>,
}

impl EngineView {
    pub(crate) fn capture(store: &ItemStateStore, history: &History) -> Self {
        Self {
            store: store.clone(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
            undo_depth: history.undo_len(),
            redo_depth: history.redo_len(),
            last_executed: history.last_executed_description().map(str::to_string),
        }
    }

    /// Confirmed items
    #[inline]
    #[must_use]
    pub fn items(&self) -> &OrdMap<ItemId, Item> {
        self.store.confirmed()
    }

    /// Unconfirmed changes
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &OrdMap<ItemId, PendingItem> {
        self.store.pending()
    }

    /// Selected ids
    #[inline]
    #[must_use]
    pub fn selected(&self) -> &OrdSet<ItemId> {
        self.store.selection()
    }

    /// Item as displayed, pending state first
    #[inline]
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.store.visible(id)
    }

    /// True if `id` has an unconfirmed change
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: &ItemId) -> bool {
        self.store.is_pending(id)
    }

    /// Items as displayed, in order
    #[must_use]
    pub fn visible_items(&self) -> Vec<Item> {
        self.store.visible_items()
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Whether a full fetch is running
    #[inline]
    #[must_use]
    pub fn loading(&self) -> bool {
        self.store.is_loading()
    }

    /// Most recent failure
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<&CommandError> {
        self.store.last_error()
    }

    /// Time of the last confirmed change
    #[inline]
    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.store.last_updated()
    }

    /// Underlying store snapshot
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ItemStateStore {
        &self.store
    }
}
