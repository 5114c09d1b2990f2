//! Optimistic entries awaiting remote confirmation

use crate::item::Item;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// What an optimistic entry does to the confirmed collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingChange {
    /// Item does not exist yet on the confirmed side
    Insert,
    /// Replaces a confirmed item
    Update,
    /// Removes a confirmed item; `item` holds its last known state
    Delete,
}

/// An item staged optimistically
///
/// Lives from optimistic application until the owning remote call resolves.
/// It is then promoted (possibly under a server-assigned id) or discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    /// Staged item state
    pub item: Item,
    /// Temporary id, unique per staging
    pub temp_id: String,
    /// Kind of staged change
    pub change: PendingChange,
}

impl PendingItem {
    /// Stage an item with a fresh temporary id
    #[must_use]
    pub fn new(item: Item, change: PendingChange) -> Self {
        Self {
            item,
            temp_id: format!("temp_{}", Ulid::new().to_string().to_lowercase()),
            change,
        }
    }

    /// Pending marker
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        true
    }

    /// True if this entry hides the item from the visible list
    #[inline]
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.change == PendingChange::Delete
    }
}
