//! Executor behaviour against a scripted remote

use mockall::Sequence;
use pretty_assertions::assert_eq;
use retrace_engine::{
    CallPurpose, CommandError, CommandErrorKind, DispatchOptions, EngineConfig, Executor, ItemId,
    ItemPatch, Operation, RemoteCall, RemoteReply,
};
use retrace_test_utils::{sample_items, visible_ids, MockRemote};
use std::sync::Arc;
use std::time::Duration;

fn executor(remote: MockRemote) -> Executor {
    Executor::new(Arc::new(remote), EngineConfig::default()).with_items(sample_items())
}

#[tokio::test]
async fn invalid_operations_never_call_the_remote() {
    let mut remote = MockRemote::new();
    remote.expect_call().never();
    let mut executor = executor(remote);

    for operation in [
        Operation::add("   "),
        Operation::update("t1", ItemPatch::new()),
        Operation::toggle("missing"),
        Operation::BulkDelete { ids: Vec::new() },
        Operation::DeleteSelected,
    ] {
        let err = executor
            .dispatch(operation, DispatchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.command_error().map(|e| e.kind), Some(CommandErrorKind::Validation));
    }
    let err = executor
        .dispatch_batch(Vec::new(), DispatchOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.command_error().map(|e| e.kind), Some(CommandErrorKind::Validation));
    assert!(!executor.history().can_undo());
}

#[tokio::test]
async fn conflict_is_terminal_and_rolled_back() {
    let mut remote = MockRemote::new();
    remote
        .expect_call()
        .times(1)
        .returning(|_, _| Err(CommandError::conflict("stale version")));
    let mut executor = executor(remote);

    let err = executor
        .dispatch(Operation::delete("t1"), DispatchOptions::new())
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert!(!err.is_fatal());

    let view = executor.view();
    assert_eq!(visible_ids(&view), vec!["t1", "t2", "t3"]);
    assert!(view.pending().is_empty());
    assert_eq!(view.last_error().map(|e| e.kind), Some(CommandErrorKind::Conflict));
}

#[tokio::test]
async fn batch_failure_compensates_confirmed_members() {
    let mut remote = MockRemote::new();
    let mut seq = Sequence::new();
    remote
        .expect_call()
        .withf(|call, ctx| {
            ctx.purpose == CallPurpose::Execute && matches!(call, RemoteCall::SetCompleted { .. })
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(RemoteReply::empty()));
    remote
        .expect_call()
        .withf(|call, ctx| {
            ctx.purpose == CallPurpose::Execute && matches!(call, RemoteCall::Delete { .. })
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(CommandError::network("connection reset")));
    remote
        .expect_call()
        .withf(|call, ctx| {
            ctx.purpose == CallPurpose::Compensate
                && ctx.command_id.is_some()
                && *call
                    == RemoteCall::SetCompleted {
                        changes: vec![(ItemId::from("t1"), false)],
                    }
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(RemoteReply::empty()));
    let mut executor = executor(remote);
    let before = executor.store().confirmed().clone();

    let err = executor
        .dispatch_batch(
            vec![Operation::toggle("t1"), Operation::delete("t2")],
            DispatchOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(executor.store().confirmed(), &before);
    assert!(executor.store().pending().is_empty());
    assert_eq!(executor.history().undo_len(), 0);
}

#[tokio::test]
async fn call_context_carries_purpose_and_deadline() {
    let mut remote = MockRemote::new();
    let mut seq = Sequence::new();
    remote
        .expect_call()
        .withf(|_, ctx| {
            ctx.purpose == CallPurpose::Execute
                && ctx.timeout == Some(Duration::from_millis(250))
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(RemoteReply::empty()));
    remote
        .expect_call()
        .withf(|call, ctx| {
            ctx.purpose == CallPurpose::Undo
                && ctx.timeout == Some(Duration::from_secs(10))
                && matches!(call, RemoteCall::SetOrder { order: 2000, .. })
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(RemoteReply::empty()));
    let mut executor = executor(remote);

    executor
        .dispatch(
            Operation::reorder("t2", 9000),
            DispatchOptions::new().with_timeout(Duration::from_millis(250)),
        )
        .await
        .unwrap();
    assert_eq!(visible_ids(&executor.view()), vec!["t1", "t3", "t2"]);

    executor.undo().await.unwrap().unwrap();
    assert_eq!(visible_ids(&executor.view()), vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn canonical_reply_replaces_projection() {
    let mut remote = MockRemote::new();
    remote.expect_call().times(1).returning(|call, _| {
        let RemoteCall::Update { id, .. } = call else {
            return Err(CommandError::unknown("unexpected call"));
        };
        // The server normalizes text on its side
        let mut item = retrace_engine::Item::new(id, "BUY MILK", 1000);
        item.completed = false;
        Ok(RemoteReply::with_items(vec![item]))
    });
    let mut executor = executor(remote);

    executor
        .dispatch(
            Operation::update("t1", ItemPatch::new().with_text("buy milk")),
            DispatchOptions::new(),
        )
        .await
        .unwrap();
    let t1 = &executor.store().confirmed()[&ItemId::from("t1")];
    assert_eq!(t1.text, "BUY MILK");
}
