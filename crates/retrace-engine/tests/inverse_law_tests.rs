//! Undo reverses, redo replays: checked over random operation sequences

use proptest::prelude::*;
use retrace_engine::sim::InMemoryRemote;
use retrace_engine::{DispatchOptions, EngineConfig, Item, ItemPatch, Operation};
use retrace_test_utils::{assert_same_items, executor_for, sample_items};
use std::sync::Arc;

fn item_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("t1"), Just("t2"), Just("t3"), Just("nope")].prop_map(String::from)
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        "[a-z]{1,12}".prop_map(Operation::add),
        item_id().prop_map(Operation::delete),
        item_id().prop_map(Operation::toggle),
        (item_id(), "[a-z ]{1,12}")
            .prop_map(|(id, text)| Operation::update(id, ItemPatch::new().with_text(text))),
        (item_id(), -5000i64..5000).prop_map(|(id, order)| Operation::reorder(id, order)),
        (item_id(), 0usize..4).prop_map(|(id, index)| Operation::MoveTo {
            id: id.into(),
            index,
        }),
        (proptest::collection::vec(item_id(), 1..4), any::<bool>()).prop_map(|(ids, completed)| {
            Operation::BulkToggle {
                ids: ids.into_iter().map(Into::into).collect(),
                completed,
            }
        }),
        proptest::collection::vec(item_id(), 1..3).prop_map(|ids| Operation::BulkDelete {
            ids: ids.into_iter().map(Into::into).collect(),
        }),
    ]
}

fn confirmed(items: &im::OrdMap<retrace_engine::ItemId, Item>) -> Vec<Item> {
    items.values().cloned().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn undo_restores_and_redo_replays(ops in proptest::collection::vec(operation(), 1..12)) {
        tokio_test::block_on(async {
            let remote = Arc::new(InMemoryRemote::new().with_items(sample_items()));
            let mut executor = executor_for(Arc::clone(&remote), EngineConfig::default());

            for op in ops {
                let before = confirmed(executor.store().confirmed());
                match executor.dispatch(op, DispatchOptions::new()).await {
                    Ok(_) => {
                        let after = confirmed(executor.store().confirmed());

                        executor.undo().await.unwrap().unwrap();
                        assert_same_items(&confirmed(executor.store().confirmed()), &before);

                        executor.redo().await.unwrap().unwrap();
                        assert_same_items(&confirmed(executor.store().confirmed()), &after);
                    }
                    Err(err) => {
                        assert!(!err.is_fatal());
                        assert_same_items(&confirmed(executor.store().confirmed()), &before);
                    }
                }
                assert!(executor.store().pending().is_empty());
            }

            let mut mirrored = remote.items();
            mirrored.sort_by(|a, b| a.id.cmp(&b.id));
            assert_same_items(&confirmed(executor.store().confirmed()), &mirrored);
        });
    }

    #[test]
    fn undoing_a_whole_sequence_returns_to_the_start(
        ops in proptest::collection::vec(operation(), 1..12),
    ) {
        tokio_test::block_on(async {
            let remote = Arc::new(InMemoryRemote::new().with_items(sample_items()));
            let config = EngineConfig::default().with_max_history_size(64);
            let mut executor = executor_for(Arc::clone(&remote), config);
            let initial = confirmed(executor.store().confirmed());

            let mut applied = 0;
            for op in ops {
                if executor.dispatch(op, DispatchOptions::new()).await.is_ok() {
                    applied += 1;
                }
            }
            let after = confirmed(executor.store().confirmed());
            assert_eq!(executor.history().undo_len(), applied);

            for _ in 0..applied {
                executor.undo().await.unwrap().unwrap();
            }
            assert_same_items(&confirmed(executor.store().confirmed()), &initial);
            assert!(executor.undo().await.unwrap().is_none());

            for _ in 0..applied {
                executor.redo().await.unwrap().unwrap();
            }
            assert_same_items(&confirmed(executor.store().confirmed()), &after);
            assert!(executor.redo().await.unwrap().is_none());
            assert!(executor.store().pending().is_empty());
        });
    }
}
