//! Testing utilities for the retrace workspace
//!
//! Shared fixtures, a mock remote, and state assertions.

#![allow(missing_docs)]

use async_trait::async_trait;
use retrace_command::{CallContext, CommandError, RemoteCall, RemoteReply, RemoteService};
use retrace_engine::sim::InMemoryRemote;
use retrace_engine::{Engine, EngineConfig, EngineView, Executor};
use retrace_model::{Item, ItemId};
use std::sync::Arc;

mockall::mock! {
    pub Remote {}

    #[async_trait]
    impl RemoteService for Remote {
        async fn call(&self, call: RemoteCall, ctx: CallContext) -> Result<RemoteReply, CommandError>;
    }
}

pub fn item(id: &str, text: &str, order: i64) -> Item {
    Item::new(id, text, order)
}

/// Three open items: t1, t2, t3 at orders 1000, 2000, 3000
pub fn sample_items() -> Vec<Item> {
    vec![
        item("t1", "Buy milk", 1000),
        item("t2", "Walk the dog", 2000),
        item("t3", "Write report", 3000),
    ]
}

pub fn ids(raw: &[&str]) -> Vec<ItemId> {
    raw.iter().map(|id| ItemId::from(*id)).collect()
}

pub fn seeded_remote() -> Arc<InMemoryRemote> {
    Arc::new(InMemoryRemote::new().with_items(sample_items()))
}

/// Executor whose confirmed state matches `remote`
pub fn executor_for(remote: Arc<InMemoryRemote>, config: EngineConfig) -> Executor {
    let items = remote.items();
    Executor::new(remote, config).with_items(items)
}

pub fn seeded_executor(config: EngineConfig) -> (Executor, Arc<InMemoryRemote>) {
    let remote = seeded_remote();
    (executor_for(Arc::clone(&remote), config), remote)
}

/// Running engine over the sample items; needs a Tokio runtime
pub fn seeded_engine(config: EngineConfig) -> (Engine, Arc<InMemoryRemote>) {
    let (executor, remote) = seeded_executor(config);
    (Engine::spawn(executor).expect("invalid engine config"), remote)
}

pub fn visible_ids(view: &EngineView) -> Vec<String> {
    view.visible_items()
        .into_iter()
        .map(|item| item.id.as_str().to_string())
        .collect()
}

/// Confirmed local state holds the same content as the remote, with nothing pending
pub fn assert_in_sync(view: &EngineView, remote: &InMemoryRemote) {
    assert!(
        view.pending().is_empty(),
        "pending entries left: {:?}",
        view.pending().keys().collect::<Vec<_>>()
    );
    let local: Vec<Item> = view.items().values().cloned().collect();
    let mut remote_items = remote.items();
    remote_items.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(local.len(), remote_items.len(), "item counts differ");
    for (mine, theirs) in local.iter().zip(&remote_items) {
        assert!(
            mine.same_content(theirs),
            "local {mine:?} differs from remote {theirs:?}"
        );
    }
}

/// Same content for the same ids, ignoring timestamps
pub fn assert_same_items(left: &[Item], right: &[Item]) {
    assert_eq!(left.len(), right.len(), "item counts differ");
    for (a, b) in left.iter().zip(right) {
        assert!(a.same_content(b), "{a:?} differs from {b:?}");
    }
}
