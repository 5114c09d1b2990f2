//! Reversible commands
//!
//! A [`Command`] wraps one [`Action`] with identity, a description and an
//! optional batch id. Its forward and inverse remote actions are derived from
//! the action's arguments and its captured undo payload.

use crate::action::{
    Action, AddItem, BulkDelete, BulkToggle, DeleteItem, ReorderItem, ToggleItem, UpdateItem,
};
use crate::error::{CommandError, MissingUndoPayload};
use crate::ids::{BatchId, CommandId};
use crate::remote::{CallContext, RemoteCall, RemoteReply, RemoteService};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use retrace_model::{Item, ItemId, ItemSource, ValidationError};
use serde::{Deserialize, Serialize};

/// Variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Create an item
    Add,
    /// Remove an item
    Delete,
    /// Change fields of an item
    Update,
    /// Flip completion
    Toggle,
    /// Move an item
    Reorder,
    /// Remove several items
    BulkDelete,
    /// Set completion on several items
    BulkToggle,
}

impl CommandKind {
    /// Stable label
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Delete => "DELETE",
            Self::Update => "UPDATE",
            Self::Toggle => "TOGGLE",
            Self::Reorder => "REORDER",
            Self::BulkDelete => "BULK_DELETE",
            Self::BulkToggle => "BULK_TOGGLE",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary for history display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Items the command touches
    pub affected_ids: Vec<ItemId>,
    /// Whether the undo payload has been captured
    pub undoable: bool,
    /// Grouping key
    pub batch_id: Option<BatchId>,
}

/// Outcome of one remote action
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// Whether the remote accepted the action
    pub success: bool,
    /// Remote answer on success
    pub data: Option<RemoteReply>,
    /// Classified failure
    pub error: Option<CommandError>,
    /// Pre-mutation items the caller needs to revert its own optimistic change
    pub rollback: Option<Vec<Item>>,
}

impl CommandResult {
    /// Successful result
    #[inline]
    #[must_use]
    pub fn ok(reply: RemoteReply) -> Self {
        Self {
            success: true,
            data: Some(reply),
            error: None,
            rollback: None,
        }
    }

    /// Failed result
    #[inline]
    #[must_use]
    pub fn failed(error: CommandError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            rollback: None,
        }
    }

    /// With rollback data
    #[inline]
    #[must_use]
    pub fn with_rollback(mut self, items: Vec<Item>) -> Self {
        self.rollback = Some(items);
        self
    }

    /// Convert into a `Result`
    ///
    /// # Errors
    /// Returns the carried error when `success` is false.
    pub fn into_result(self) -> Result<RemoteReply, CommandError> {
        if self.success {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(self
                .error
                .unwrap_or_else(|| CommandError::unknown("command failed without an error")))
        }
    }
}

/// A reversible unit of work
#[derive(Debug, Clone)]
pub struct Command {
    id: CommandId,
    description: String,
    created_at: DateTime<Utc>,
    batch_id: Option<BatchId>,
    action: Action,
}

impl Command {
    /// Wrap an action with a fresh id and a generated description
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            id: CommandId::new(),
            description: describe(&action),
            created_at: Utc::now(),
            batch_id: None,
            action,
        }
    }

    /// Add an item
    #[inline]
    #[must_use]
    pub fn add(item: Item) -> Self {
        Self::new(Action::Add(AddItem::new(item)))
    }

    /// Delete an item
    #[inline]
    #[must_use]
    pub fn delete(id: ItemId) -> Self {
        Self::new(Action::Delete(DeleteItem::new(id)))
    }

    /// Update an item
    #[inline]
    #[must_use]
    pub fn update(id: ItemId, patch: retrace_model::ItemPatch) -> Self {
        Self::new(Action::Update(UpdateItem::new(id, patch)))
    }

    /// Toggle an item
    #[inline]
    #[must_use]
    pub fn toggle(id: ItemId) -> Self {
        Self::new(Action::Toggle(ToggleItem::new(id)))
    }

    /// Reorder an item
    #[inline]
    #[must_use]
    pub fn reorder(id: ItemId, order: i64) -> Self {
        Self::new(Action::Reorder(ReorderItem::new(id, order)))
    }

    /// Delete several items
    #[inline]
    #[must_use]
    pub fn bulk_delete(ids: Vec<ItemId>) -> Self {
        Self::new(Action::BulkDelete(BulkDelete::new(ids)))
    }

    /// Set completion on several items
    #[inline]
    #[must_use]
    pub fn bulk_toggle(ids: Vec<ItemId>, completed: bool) -> Self {
        Self::new(Action::BulkToggle(BulkToggle::new(ids, completed)))
    }

    /// With batch id
    #[inline]
    #[must_use]
    pub fn with_batch(mut self, batch_id: Option<BatchId>) -> Self {
        self.batch_id = batch_id;
        self
    }

    /// With a caller-provided description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Command id
    #[inline]
    #[must_use]
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Variant tag
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match &self.action {
            Action::Add(_) => CommandKind::Add,
            Action::Delete(_) => CommandKind::Delete,
            Action::Update(_) => CommandKind::Update,
            Action::Toggle(_) => CommandKind::Toggle,
            Action::Reorder(_) => CommandKind::Reorder,
            Action::BulkDelete(_) => CommandKind::BulkDelete,
            Action::BulkToggle(_) => CommandKind::BulkToggle,
        }
    }

    /// Human-readable description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Batch id
    #[inline]
    #[must_use]
    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    /// Variant payload
    #[inline]
    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// True once the undo payload has been captured
    #[must_use]
    pub fn can_undo(&self) -> bool {
        match &self.action {
            Action::Add(a) => a.created.get().is_some(),
            Action::Delete(a) => a.removed.get().is_some(),
            Action::Update(a) => a.previous.get().is_some(),
            Action::Toggle(a) => a.previous.get().is_some(),
            Action::Reorder(a) => a.previous.get().is_some(),
            Action::BulkDelete(a) => a.removed.get().is_some(),
            Action::BulkToggle(a) => a.previous.get().is_some(),
        }
    }

    /// Ids the command touches
    #[must_use]
    pub fn affected_ids(&self) -> Vec<ItemId> {
        match &self.action {
            Action::Add(a) => vec![a.created().map_or_else(|| a.item.id.clone(), |c| c.id.clone())],
            Action::Delete(a) => vec![a.id.clone()],
            Action::Update(a) => vec![a.id.clone()],
            Action::Toggle(a) => vec![a.id.clone()],
            Action::Reorder(a) => vec![a.id.clone()],
            Action::BulkDelete(a) => a.ids.clone(),
            Action::BulkToggle(a) => a.ids.clone(),
        }
    }

    /// Metadata for history display
    #[must_use]
    pub fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            affected_ids: self.affected_ids(),
            undoable: self.can_undo(),
            batch_id: self.batch_id,
        }
    }

    /// Forward remote action
    ///
    /// Before the payload is captured this is the original request, computed
    /// against `before`. Afterwards it is an identity-preserving replay: an
    /// add re-creates the captured item, a toggle sets `!previous`.
    ///
    /// # Errors
    /// Validation error if a toggle target is missing from `before`.
    pub fn forward_call(&self, before: &dyn ItemSource) -> Result<RemoteCall, CommandError> {
        let call = match &self.action {
            Action::Add(a) => match a.created() {
                Some(created) => RemoteCall::Restore {
                    items: vec![created.clone()],
                },
                None => RemoteCall::Create { item: a.item.clone() },
            },
            Action::Delete(a) => RemoteCall::Delete {
                ids: vec![a.id.clone()],
            },
            Action::Update(a) => RemoteCall::Update {
                id: a.id.clone(),
                patch: a.patch.clone(),
            },
            Action::Toggle(a) => {
                let current = match a.previous() {
                    Some(previous) => previous,
                    None => {
                        before
                            .get_item(&a.id)
                            .ok_or_else(|| self.unknown_item(&a.id))?
                            .completed
                    }
                };
                RemoteCall::SetCompleted {
                    changes: vec![(a.id.clone(), !current)],
                }
            }
            Action::Reorder(a) => RemoteCall::SetOrder {
                id: a.id.clone(),
                order: a.order,
            },
            Action::BulkDelete(a) => RemoteCall::Delete { ids: a.ids.clone() },
            Action::BulkToggle(a) => RemoteCall::SetCompleted {
                changes: a.ids.iter().map(|id| (id.clone(), a.completed)).collect(),
            },
        };
        Ok(call)
    }

    /// Inverse remote action
    ///
    /// # Errors
    /// [`MissingUndoPayload`] if the forward action was never confirmed.
    pub fn inverse_call(&self) -> Result<RemoteCall, MissingUndoPayload> {
        let missing = || MissingUndoPayload {
            command_id: self.id,
            kind: self.kind(),
        };
        let call = match &self.action {
            Action::Add(a) => RemoteCall::Delete {
                ids: vec![a.created().ok_or_else(missing)?.id.clone()],
            },
            Action::Delete(a) => RemoteCall::Restore {
                items: vec![a.removed().ok_or_else(missing)?.clone()],
            },
            Action::Update(a) => RemoteCall::Update {
                id: a.id.clone(),
                patch: a.previous().ok_or_else(missing)?.clone(),
            },
            Action::Toggle(a) => RemoteCall::SetCompleted {
                changes: vec![(a.id.clone(), a.previous().ok_or_else(missing)?)],
            },
            Action::Reorder(a) => RemoteCall::SetOrder {
                id: a.id.clone(),
                order: a.previous().ok_or_else(missing)?,
            },
            Action::BulkDelete(a) => RemoteCall::Restore {
                items: a.removed().ok_or_else(missing)?.to_vec(),
            },
            Action::BulkToggle(a) => {
                let previous = a.previous().ok_or_else(missing)?;
                RemoteCall::SetCompleted {
                    changes: a
                        .ids
                        .iter()
                        .filter_map(|id| previous.get(id).map(|flag| (id.clone(), *flag)))
                        .collect(),
                }
            }
        };
        Ok(call)
    }

    /// Fill the undo payload after the forward action was confirmed
    ///
    /// `before` is the pre-mutation state; `reply` is the remote answer (an
    /// add takes its created item from there). Calling this on a command whose
    /// payload is already present is a no-op: the payload never changes.
    ///
    /// # Errors
    /// [`MissingUndoPayload`] if `before` lacks a target, so nothing could be
    /// captured.
    pub fn capture_undo(
        &self,
        before: &dyn ItemSource,
        reply: &RemoteReply,
    ) -> Result<(), MissingUndoPayload> {
        if self.can_undo() {
            return Ok(());
        }
        let missing = || MissingUndoPayload {
            command_id: self.id,
            kind: self.kind(),
        };
        let lookup = |id: &ItemId| before.get_item(id).ok_or_else(missing);

        match &self.action {
            Action::Add(a) => {
                let created = reply.items.first().cloned().unwrap_or_else(|| a.item.clone());
                fill(&a.created, created);
            }
            Action::Delete(a) => {
                fill(&a.removed, lookup(&a.id)?);
            }
            Action::Update(a) => {
                fill(&a.previous, a.patch.previous_values(&lookup(&a.id)?));
            }
            Action::Toggle(a) => {
                fill(&a.previous, lookup(&a.id)?.completed);
            }
            Action::Reorder(a) => {
                fill(&a.previous, lookup(&a.id)?.order);
            }
            Action::BulkDelete(a) => {
                let removed = a.ids.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
                fill(&a.removed, removed);
            }
            Action::BulkToggle(a) => {
                let previous = a
                    .ids
                    .iter()
                    .map(|id| lookup(id).map(|item| (id.clone(), item.completed)))
                    .collect::<Result<_, _>>()?;
                fill(&a.previous, previous);
            }
        }
        tracing::trace!(command = %self.id, kind = %self.kind(), "undo payload captured");
        Ok(())
    }

    /// Perform the forward remote action
    pub async fn execute(
        &self,
        remote: &dyn RemoteService,
        ctx: CallContext,
        before: &dyn ItemSource,
    ) -> CommandResult {
        let call = match self.forward_call(before) {
            Ok(call) => call,
            Err(err) => return CommandResult::failed(err),
        };
        tracing::debug!(command = %self.id, call = call.name(), purpose = ?ctx.purpose, "forward action");
        match remote.call(call, ctx.for_command(self.id)).await {
            Ok(reply) => CommandResult::ok(reply),
            Err(err) => CommandResult::failed(err.with_command(self.id)),
        }
    }

    /// Perform the inverse remote action
    ///
    /// # Errors
    /// [`MissingUndoPayload`] if the command was never confirmed. This is a
    /// logic defect; callers must not treat it as a remote failure.
    pub async fn undo(
        &self,
        remote: &dyn RemoteService,
        ctx: CallContext,
    ) -> Result<CommandResult, MissingUndoPayload> {
        let call = self.inverse_call()?;
        tracing::debug!(command = %self.id, call = call.name(), "inverse action");
        Ok(match remote.call(call, ctx.for_command(self.id)).await {
            Ok(reply) => CommandResult::ok(reply),
            Err(err) => CommandResult::failed(err.with_command(self.id)),
        })
    }

    fn unknown_item(&self, id: &ItemId) -> CommandError {
        CommandError::from(ValidationError::UnknownItem(id.clone())).with_command(self.id)
    }
}

fn describe(action: &Action) -> String {
    fn count(n: usize) -> String {
        if n == 1 {
            "1 item".to_string()
        } else {
            format!("{n} items")
        }
    }

    match action {
        Action::Add(a) => format!("Add \"{}\"", a.item.text),
        Action::Delete(a) => format!("Delete item {}", a.id),
        Action::Update(a) => format!("Update {} of item {}", a.patch.field_names().join(", "), a.id),
        Action::Toggle(a) => format!("Toggle item {}", a.id),
        Action::Reorder(a) => format!("Move item {}", a.id),
        Action::BulkDelete(a) => format!("Delete {}", count(a.ids.len())),
        Action::BulkToggle(a) if a.completed => format!("Complete {}", count(a.ids.len())),
        Action::BulkToggle(a) => format!("Reopen {}", count(a.ids.len())),
    }
}

/// Write a payload slot that must still be empty
fn fill<T>(slot: &OnceCell<T>, value: T) {
    let filled = slot.set(value).is_ok();
    debug_assert!(filled, "undo payload written twice");
}
