//! Variant payloads
//!
//! Each variant holds its forward arguments plus a write-once undo slot.
//! The slot is filled when the forward action is first confirmed and can
//! never be replaced afterwards.

use once_cell::sync::OnceCell;
use retrace_model::{Item, ItemId, ItemPatch};
use std::collections::BTreeMap;

/// Create an item
#[derive(Debug, Clone)]
pub struct AddItem {
    /// Client-built candidate
    pub item: Item,
    pub(crate) created: OnceCell<Item>,
}

impl AddItem {
    /// New add action
    #[inline]
    #[must_use]
    pub fn new(item: Item) -> Self {
        Self {
            item,
            created: OnceCell::new(),
        }
    }

    /// Confirmed item, once captured
    #[inline]
    #[must_use]
    pub fn created(&self) -> Option<&Item> {
        self.created.get()
    }
}

/// Remove an item
#[derive(Debug, Clone)]
pub struct DeleteItem {
    /// Target
    pub id: ItemId,
    pub(crate) removed: OnceCell<Item>,
}

impl DeleteItem {
    /// New delete action
    #[inline]
    #[must_use]
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            removed: OnceCell::new(),
        }
    }

    /// Removed item, once captured
    #[inline]
    #[must_use]
    pub fn removed(&self) -> Option<&Item> {
        self.removed.get()
    }
}

/// Change some fields of an item
#[derive(Debug, Clone)]
pub struct UpdateItem {
    /// Target
    pub id: ItemId,
    /// Fields to change
    pub patch: ItemPatch,
    pub(crate) previous: OnceCell<ItemPatch>,
}

impl UpdateItem {
    /// New update action
    #[inline]
    #[must_use]
    pub fn new(id: ItemId, patch: ItemPatch) -> Self {
        Self {
            id,
            patch,
            previous: OnceCell::new(),
        }
    }

    /// Prior values of the changed fields, once captured
    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<&ItemPatch> {
        self.previous.get()
    }
}

/// Flip completion
#[derive(Debug, Clone)]
pub struct ToggleItem {
    /// Target
    pub id: ItemId,
    pub(crate) previous: OnceCell<bool>,
}

impl ToggleItem {
    /// New toggle action
    #[inline]
    #[must_use]
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            previous: OnceCell::new(),
        }
    }

    /// Completion flag before the first toggle, once captured
    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<bool> {
        self.previous.get().copied()
    }
}

/// Move an item
#[derive(Debug, Clone)]
pub struct ReorderItem {
    /// Target
    pub id: ItemId,
    /// New order value
    pub order: i64,
    pub(crate) previous: OnceCell<i64>,
}

impl ReorderItem {
    /// New reorder action
    #[inline]
    #[must_use]
    pub fn new(id: ItemId, order: i64) -> Self {
        Self {
            id,
            order,
            previous: OnceCell::new(),
        }
    }

    /// Order value before the move, once captured
    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<i64> {
        self.previous.get().copied()
    }
}

/// Remove several items
#[derive(Debug, Clone)]
pub struct BulkDelete {
    /// Targets
    pub ids: Vec<ItemId>,
    pub(crate) removed: OnceCell<Vec<Item>>,
}

impl BulkDelete {
    /// New bulk delete action
    #[inline]
    #[must_use]
    pub fn new(ids: Vec<ItemId>) -> Self {
        Self {
            ids,
            removed: OnceCell::new(),
        }
    }

    /// Removed items, once captured
    #[inline]
    #[must_use]
    pub fn removed(&self) -> Option<&[Item]> {
        self.removed.get().map(Vec::as_slice)
    }
}

/// Set several items to one completion value
#[derive(Debug, Clone)]
pub struct BulkToggle {
    /// Targets
    pub ids: Vec<ItemId>,
    /// Target completion value
    pub completed: bool,
    pub(crate) previous: OnceCell<BTreeMap<ItemId, bool>>,
}

impl BulkToggle {
    /// New bulk toggle action
    #[inline]
    #[must_use]
    pub fn new(ids: Vec<ItemId>, completed: bool) -> Self {
        Self {
            ids,
            completed,
            previous: OnceCell::new(),
        }
    }

    /// Prior completion per item, once captured
    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<&BTreeMap<ItemId, bool>> {
        self.previous.get()
    }
}

/// Tagged union over every command variant
#[derive(Debug, Clone)]
pub enum Action {
    /// Create an item
    Add(AddItem),
    /// Remove an item
    Delete(DeleteItem),
    /// Change fields of an item
    Update(UpdateItem),
    /// Flip completion
    Toggle(ToggleItem),
    /// Move an item
    Reorder(ReorderItem),
    /// Remove several items
    BulkDelete(BulkDelete),
    /// Set completion on several items
    BulkToggle(BulkToggle),
}
