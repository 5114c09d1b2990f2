//! Read access to keyed item collections

use crate::item::{Item, ItemId};
use std::collections::{BTreeMap, HashMap};

/// Lookup of items by id
///
/// Implemented by the engine's store views and by plain maps, so that
/// commands can inspect state without depending on the store type.
pub trait ItemSource: Send + Sync {
    /// Item with `id`, if present
    fn get_item(&self, id: &ItemId) -> Option<Item>;

    /// True if `id` is present
    fn contains_item(&self, id: &ItemId) -> bool {
        self.get_item(id).is_some()
    }
}

impl ItemSource for BTreeMap<ItemId, Item> {
    fn get_item(&self, id: &ItemId) -> Option<Item> {
        self.get(id).cloned()
    }
}

impl ItemSource for HashMap<ItemId, Item> {
    fn get_item(&self, id: &ItemId) -> Option<Item> {
        self.get(id).cloned()
    }
}

impl<T: ItemSource + ?Sized> ItemSource for &T {
    fn get_item(&self, id: &ItemId) -> Option<Item> {
        (**self).get_item(id)
    }
}
