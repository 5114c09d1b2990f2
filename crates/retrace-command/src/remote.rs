//! Remote-service seam
//!
//! Every command's forward and inverse action is expressed as a
//! [`RemoteCall`]. The same value drives the optimistic local projection
//! ([`RemoteCall::project`]) and the canonical reconciliation once the
//! remote has answered ([`RemoteCall::reconcile`]).

use crate::error::CommandError;
use crate::ids::CommandId;
use retrace_model::{Item, ItemId, ItemPatch, ItemSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single request to the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteCall {
    /// Return every item
    FetchAll,
    /// Create a new item; the remote may assign its own id
    Create {
        /// Client-built candidate
        item: Item,
    },
    /// Re-create items with their original ids and fields
    Restore {
        /// Items to bring back
        items: Vec<Item>,
    },
    /// Apply a partial update
    Update {
        /// Target
        id: ItemId,
        /// Fields to change
        patch: ItemPatch,
    },
    /// Set completion per item
    SetCompleted {
        /// Target and desired flag, in application order
        changes: Vec<(ItemId, bool)>,
    },
    /// Move an item to a new order value
    SetOrder {
        /// Target
        id: ItemId,
        /// New order value
        order: i64,
    },
    /// Remove items
    Delete {
        /// Targets
        ids: Vec<ItemId>,
    },
}

impl RemoteCall {
    /// Short operation name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchAll => "fetch_all",
            Self::Create { .. } => "create",
            Self::Restore { .. } => "restore",
            Self::Update { .. } => "update",
            Self::SetCompleted { .. } => "set_completed",
            Self::SetOrder { .. } => "set_order",
            Self::Delete { .. } => "delete",
        }
    }

    /// Ids this call touches
    #[must_use]
    pub fn target_ids(&self) -> Vec<ItemId> {
        match self {
            Self::FetchAll => Vec::new(),
            Self::Create { item } => vec![item.id.clone()],
            Self::Restore { items } => items.iter().map(|i| i.id.clone()).collect(),
            Self::Update { id, .. } | Self::SetOrder { id, .. } => vec![id.clone()],
            Self::SetCompleted { changes } => changes.iter().map(|(id, _)| id.clone()).collect(),
            Self::Delete { ids } => ids.clone(),
        }
    }

    /// Local effects this call is expected to have, computed against `source`
    ///
    /// Targets missing from `source` are skipped; the remote decides whether
    /// that is a conflict.
    #[must_use]
    pub fn project(&self, source: &dyn ItemSource) -> Vec<Effect> {
        match self {
            Self::FetchAll => Vec::new(),
            Self::Create { item } => vec![Effect::Upsert(item.clone())],
            Self::Restore { items } => items.iter().cloned().map(Effect::Upsert).collect(),
            Self::Update { id, patch } => source
                .get_item(id)
                .map(|mut item| {
                    patch.apply(&mut item);
                    Effect::Upsert(item)
                })
                .into_iter()
                .collect(),
            Self::SetCompleted { changes } => changes
                .iter()
                .filter_map(|(id, completed)| {
                    source.get_item(id).map(|mut item| {
                        item.completed = *completed;
                        item.touch();
                        Effect::Upsert(item)
                    })
                })
                .collect(),
            Self::SetOrder { id, order } => source
                .get_item(id)
                .map(|mut item| {
                    item.order = *order;
                    item.touch();
                    Effect::Upsert(item)
                })
                .into_iter()
                .collect(),
            Self::Delete { ids } => ids.iter().cloned().map(Effect::Remove).collect(),
        }
    }

    /// Replace projected effects with canonical data from `reply`
    ///
    /// A create adopts the first returned item wholesale, including a
    /// server-assigned id. Other calls swap each projected upsert for the
    /// returned item with the same id; returned items that were not targeted
    /// are ignored.
    #[must_use]
    pub fn reconcile(&self, projected: Vec<Effect>, reply: &RemoteReply) -> Vec<Effect> {
        if reply.items.is_empty() {
            return projected;
        }
        match self {
            Self::Create { .. } => vec![Effect::Upsert(reply.items[0].clone())],
            Self::FetchAll => reply.items.iter().cloned().map(Effect::Upsert).collect(),
            _ => projected
                .into_iter()
                .map(|effect| match effect {
                    Effect::Upsert(item) => reply
                        .items
                        .iter()
                        .find(|canonical| canonical.id == item.id)
                        .cloned()
                        .map_or(Effect::Upsert(item), Effect::Upsert),
                    removal @ Effect::Remove(_) => removal,
                })
                .collect(),
        }
    }
}

/// A local state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Insert or replace an item
    Upsert(Item),
    /// Remove an item
    Remove(ItemId),
}

impl Effect {
    /// Id of the affected item
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ItemId {
        match self {
            Self::Upsert(item) => &item.id,
            Self::Remove(id) => id,
        }
    }
}

/// Successful remote answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReply {
    /// Canonical item data; empty when the remote returns none
    #[serde(default)]
    pub items: Vec<Item>,
}

impl RemoteReply {
    /// Reply without data
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reply carrying canonical items
    #[inline]
    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        Self { items }
    }
}

/// Why a remote call is made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPurpose {
    /// First forward execution
    Execute,
    /// Inverse action
    Undo,
    /// Replayed forward action
    Redo,
    /// Best-effort reversal after a partially failed batch
    Compensate,
    /// Full list fetch
    Load,
}

/// Per-call metadata passed to the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Issuing command, if any
    pub command_id: Option<CommandId>,
    /// Why the call is made
    pub purpose: CallPurpose,
    /// Deadline hint; enforcing it is the remote boundary's job
    pub timeout: Option<Duration>,
}

impl CallContext {
    /// Context for `purpose` without a command or deadline
    #[inline]
    #[must_use]
    pub fn new(purpose: CallPurpose) -> Self {
        Self {
            command_id: None,
            purpose,
            timeout: None,
        }
    }

    /// With issuing command
    #[inline]
    #[must_use]
    pub fn for_command(mut self, command_id: CommandId) -> Self {
        self.command_id = Some(command_id);
        self
    }

    /// With deadline hint
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Remote service collaborator
///
/// Implement this trait to connect the engine to a backend. Failures must be
/// classified; timeouts are reported here, never injected by the engine.
#[async_trait::async_trait]
pub trait RemoteService: Send + Sync {
    /// Perform one call
    async fn call(&self, call: RemoteCall, ctx: CallContext) -> Result<RemoteReply, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn source() -> BTreeMap<ItemId, Item> {
        let mut map = BTreeMap::new();
        for item in [Item::new("a", "alpha", 1), Item::new("b", "beta", 2)] {
            map.insert(item.id.clone(), item);
        }
        map
    }

    #[test]
    fn project_update_applies_patch_to_current_item() {
        let call = RemoteCall::Update {
            id: "a".into(),
            patch: ItemPatch::new().with_text("ALPHA"),
        };
        let effects = call.project(&source());
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Upsert(item) => assert_eq!(item.text, "ALPHA"),
            Effect::Remove(_) => panic!("expected upsert"),
        }
    }

    #[test]
    fn project_skips_missing_targets() {
        let call = RemoteCall::SetCompleted {
            changes: vec![("a".into(), true), ("zzz".into(), true)],
        };
        let effects = call.project(&source());
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].id(), &ItemId::from("a"));
    }

    #[test]
    fn reconcile_create_adopts_server_id() {
        let candidate = Item::new("client", "new", 3);
        let call = RemoteCall::Create { item: candidate.clone() };
        let projected = call.project(&source());

        let mut canonical = candidate;
        canonical.id = "server-1".into();
        let reconciled = call.reconcile(projected, &RemoteReply::with_items(vec![canonical.clone()]));
        assert_eq!(reconciled, vec![Effect::Upsert(canonical)]);
    }

    #[test]
    fn reconcile_keeps_projection_without_data() {
        let call = RemoteCall::Delete { ids: vec!["a".into()] };
        let projected = call.project(&source());
        let reconciled = call.reconcile(projected.clone(), &RemoteReply::empty());
        assert_eq!(reconciled, projected);
    }

    #[test]
    fn reconcile_ignores_untargeted_items() {
        let call = RemoteCall::SetOrder { id: "a".into(), order: 10 };
        let projected = call.project(&source());
        let mut canonical = Item::new("a", "alpha (server)", 10);
        canonical.completed = true;
        let stray = Item::new("c", "unrelated", 99);

        let reconciled = call.reconcile(projected, &RemoteReply::with_items(vec![stray, canonical.clone()]));
        assert_eq!(reconciled, vec![Effect::Upsert(canonical)]);
    }

    #[test]
    fn target_ids_cover_every_call() {
        assert!(RemoteCall::FetchAll.target_ids().is_empty());
        let call = RemoteCall::SetCompleted {
            changes: vec![("a".into(), true), ("b".into(), false)],
        };
        assert_eq!(call.target_ids(), vec![ItemId::from("a"), ItemId::from("b")]);
    }
}
