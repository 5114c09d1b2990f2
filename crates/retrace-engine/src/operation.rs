//! Caller requests
//!
//! An [`Operation`] is what the caller wants done. The executor validates it
//! against current state and turns it into a [`Command`].

use crate::store::ItemStateStore;
use retrace_command::{BatchId, Command, CommandError};
use retrace_model::{validate_text, Item, ItemId, ItemPatch, NewItem, ValidationError};
use std::time::Duration;

/// A requested change to the item list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Append a new item
    Add(NewItem),
    /// Remove an item
    Delete {
        /// Target
        id: ItemId,
    },
    /// Change some fields of an item
    Update {
        /// Target
        id: ItemId,
        /// Fields to change
        patch: ItemPatch,
    },
    /// Flip completion
    Toggle {
        /// Target
        id: ItemId,
    },
    /// Set an explicit order value
    Reorder {
        /// Target
        id: ItemId,
        /// New order value
        order: i64,
    },
    /// Move to a position in the visible list
    MoveTo {
        /// Target
        id: ItemId,
        /// Drop index among the other visible items
        index: usize,
    },
    /// Remove several items
    BulkDelete {
        /// Targets
        ids: Vec<ItemId>,
    },
    /// Set completion on several items
    BulkToggle {
        /// Targets
        ids: Vec<ItemId>,
        /// Target completion value
        completed: bool,
    },
    /// Remove every selected item
    DeleteSelected,
    /// Set completion on every selected item
    SetSelectedCompleted {
        /// Target completion value
        completed: bool,
    },
}

impl Operation {
    /// Add from plain text
    #[inline]
    #[must_use]
    pub fn add(text: impl Into<String>) -> Self {
        Self::Add(NewItem::new(text))
    }

    /// Delete by id
    #[inline]
    #[must_use]
    pub fn delete(id: impl Into<ItemId>) -> Self {
        Self::Delete { id: id.into() }
    }

    /// Update by id
    #[inline]
    #[must_use]
    pub fn update(id: impl Into<ItemId>, patch: ItemPatch) -> Self {
        Self::Update {
            id: id.into(),
            patch,
        }
    }

    /// Toggle by id
    #[inline]
    #[must_use]
    pub fn toggle(id: impl Into<ItemId>) -> Self {
        Self::Toggle { id: id.into() }
    }

    /// Reorder by id
    #[inline]
    #[must_use]
    pub fn reorder(id: impl Into<ItemId>, order: i64) -> Self {
        Self::Reorder {
            id: id.into(),
            order,
        }
    }

    /// Validate against `store` and build the command
    ///
    /// # Errors
    /// Validation error for empty or oversized text, empty patches, unknown
    /// targets and empty target lists.
    pub(crate) fn into_command(
        self,
        store: &ItemStateStore,
        max_text_len: usize,
        order_step: i64,
    ) -> Result<Command, CommandError> {
        let command = match self {
            Self::Add(request) => {
                validate_text(request.text.trim(), max_text_len)?;
                let order = store.next_order(order_step);
                Command::add(Item::from_request(request, order))
            }
            Self::Delete { id } => Command::delete(existing(store, id)?),
            Self::Update { id, patch } => {
                let patch = patch.normalized();
                if patch.is_empty() {
                    return Err(ValidationError::EmptyPatch.into());
                }
                if let Some(text) = &patch.text {
                    validate_text(text, max_text_len)?;
                }
                Command::update(existing(store, id)?, patch)
            }
            Self::Toggle { id } => Command::toggle(existing(store, id)?),
            Self::Reorder { id, order } => Command::reorder(existing(store, id)?, order),
            Self::MoveTo { id, index } => {
                let id = existing(store, id)?;
                let order = store
                    .order_for_index(&id, index, order_step)
                    .ok_or_else(|| ValidationError::UnknownItem(id.clone()))?;
                Command::reorder(id, order)
            }
            Self::BulkDelete { ids } => Command::bulk_delete(targets(store, ids)?),
            Self::BulkToggle { ids, completed } => {
                Command::bulk_toggle(targets(store, ids)?, completed)
            }
            Self::DeleteSelected => Command::bulk_delete(targets(store, store.selected_ids())?),
            Self::SetSelectedCompleted { completed } => {
                Command::bulk_toggle(targets(store, store.selected_ids())?, completed)
            }
        };
        Ok(command)
    }
}

fn existing(store: &ItemStateStore, id: ItemId) -> Result<ItemId, ValidationError> {
    if store.contains_visible(&id) {
        Ok(id)
    } else {
        Err(ValidationError::UnknownItem(id))
    }
}

/// Dedupe preserving first occurrence, then require every target to exist
fn targets(store: &ItemStateStore, ids: Vec<ItemId>) -> Result<Vec<ItemId>, ValidationError> {
    let mut unique: Vec<ItemId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    if unique.is_empty() {
        return Err(ValidationError::NoTargets);
    }
    unique.into_iter().map(|id| existing(store, id)).collect()
}

/// Per-dispatch options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Apply before the remote answers; `None` uses the engine default
    pub optimistic: Option<bool>,
    /// Keep the command out of history
    pub skip_history: bool,
    /// Group with other commands for undo/redo
    pub batch_id: Option<BatchId>,
    /// Deadline hint for the remote; `None` uses the engine default
    pub timeout: Option<Duration>,
}

impl DispatchOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With optimistic flag
    #[inline]
    #[must_use]
    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = Some(optimistic);
        self
    }

    /// Keep out of history
    #[inline]
    #[must_use]
    pub fn skip_history(mut self) -> Self {
        self.skip_history = true;
        self
    }

    /// With batch id
    #[inline]
    #[must_use]
    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// With deadline hint
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use retrace_command::{Action, CommandErrorKind};

    fn store() -> ItemStateStore {
        ItemStateStore::with_items([
            Item::new("a", "alpha", 1024),
            Item::new("b", "beta", 2048),
        ])
    }

    #[test]
    fn add_appends_after_last_item() {
        let cmd = Operation::add("  gamma ").into_command(&store(), 500, 1024).unwrap();
        match cmd.action() {
            Action::Add(a) => {
                assert_eq!(a.item.text, "gamma");
                assert_eq!(a.item.order, 3072);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = Operation::add("   ").into_command(&store(), 500, 1024).unwrap_err();
        assert_eq!(err.kind, CommandErrorKind::Validation);
        assert!(!err.retryable);
    }

    #[test]
    fn oversized_update_text_is_rejected() {
        let op = Operation::update("a", ItemPatch::new().with_text("x".repeat(11)));
        assert!(op.into_command(&store(), 10, 1024).is_err());
    }

    #[test]
    fn unknown_target_is_rejected() {
        let err = Operation::toggle("zzz").into_command(&store(), 500, 1024).unwrap_err();
        assert!(err.message.contains("zzz"));
    }

    #[test]
    fn bulk_targets_are_deduped() {
        let op = Operation::BulkDelete {
            ids: vec!["a".into(), "b".into(), "a".into()],
        };
        let cmd = op.into_command(&store(), 500, 1024).unwrap();
        assert_eq!(cmd.affected_ids(), vec![ItemId::from("a"), ItemId::from("b")]);
        assert_eq!(cmd.description(), "Delete 2 items");
    }

    #[test]
    fn empty_selection_has_no_targets() {
        let err = Operation::DeleteSelected
            .into_command(&store(), 500, 1024)
            .unwrap_err();
        assert_eq!(err.kind, CommandErrorKind::Validation);
    }

    #[test]
    fn empty_patch_is_rejected() {
        let op = Operation::update("a", ItemPatch::new());
        assert!(op.into_command(&store(), 500, 1024).is_err());
    }
}
