//! Serialized executor
//!
//! The executor owns the item store and the history. Every protocol
//! (dispatch, batch, undo, redo, load) takes `&mut self`, so at most one runs
//! at a time. The only suspension point inside a protocol is the remote call;
//! all local mutation happens synchronously around it.
//!
//! Protocol outline:
//! 1. Build and validate the command(s) against current state
//! 2. Stage the projected effects in the pending overlay and publish
//! 3. Await the remote
//! 4. Success: capture the undo payload, settle canonical data, promote,
//!    record history
//! 5. Failure: discard the overlay, compensate members that were already
//!    confirmed remotely, record the error
//!
//! Missing undo payloads and history rejections are logic defects. They are
//! reported as [`EngineError::Invariant`] and the executor refuses further
//! work.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::{CommandEvent, EVENT_CAPACITY};
use crate::operation::{DispatchOptions, Operation};
use crate::store::ItemStateStore;
use crate::view::EngineView;
use retrace_command::{
    BatchId, CallContext, CallPurpose, Command, CommandError, CommandErrorKind, CommandId,
    RemoteCall, RemoteService,
};
use retrace_history::{History, HistoryEntry};
use retrace_model::{Item, ItemId, ItemSource, ValidationError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// What a successful protocol did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Commands that ran, in execution order
    pub command_ids: Vec<CommandId>,
    /// Shared batch id, if any
    pub batch_id: Option<BatchId>,
    /// Human-readable summary
    pub description: String,
    /// Items touched; an add reports the id the remote assigned
    pub affected: Vec<ItemId>,
}

impl Receipt {
    fn for_commands<'a>(commands: impl IntoIterator<Item = &'a Command>) -> Self {
        let commands: Vec<&Command> = commands.into_iter().collect();
        let description = match commands.as_slice() {
            [single] => single.description().to_string(),
            many => format!("{} changes", many.len()),
        };
        Self {
            command_ids: commands.iter().map(|c| c.id()).collect(),
            batch_id: commands.first().and_then(|c| c.batch_id()),
            description,
            affected: commands.iter().flat_map(|c| c.affected_ids()).collect(),
        }
    }
}

/// Selection edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    /// Add visible ids
    Select(Vec<ItemId>),
    /// Remove ids
    Deselect(Vec<ItemId>),
    /// Flip one id
    Toggle(ItemId),
    /// Select every visible item
    All,
    /// Empty the selection
    Clear,
}

/// Single-writer executor over one item store
pub struct Executor {
    store: ItemStateStore,
    history: History,
    remote: Arc<dyn RemoteService>,
    config: EngineConfig,
    views: watch::Sender<EngineView>,
    events: broadcast::Sender<CommandEvent>,
    fault: Option<String>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("items", &self.store.confirmed().len())
            .field("pending", &self.store.pending().len())
            .field("undo_depth", &self.history.undo_len())
            .field("redo_depth", &self.history.redo_len())
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor with an empty store
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteService>, config: EngineConfig) -> Self {
        let store = ItemStateStore::new();
        let history = History::new(config.max_history_size);
        let (views, _) = watch::channel(EngineView::capture(&store, &history));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            history,
            remote,
            config,
            views,
            events,
            fault: None,
        }
    }

    /// With confirmed items already present
    #[must_use]
    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.store.replace_confirmed(items);
        self.publish();
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ItemStateStore {
        &self.store
    }

    /// Current history
    #[inline]
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn view(&self) -> EngineView {
        EngineView::capture(&self.store, &self.history)
    }

    /// Receive a snapshot after every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.views.subscribe()
    }

    /// Receive an event for every command outcome from now on
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<CommandEvent> {
        self.events.clone()
    }

    /// True after an invariant violation
    #[inline]
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    // ========================================================================
    // Protocols
    // ========================================================================

    /// Run one operation
    ///
    /// With a batch id the command joins the top history entry of that
    /// batch. If it fails, the batch members recorded before it are reversed
    /// and dropped, so a batch never stays half applied.
    ///
    /// # Errors
    /// - `EngineError::Command` on validation or remote failure; state is
    ///   rolled back and the error is recorded in the store
    /// - `EngineError::Invariant` on a logic defect
    /// - `EngineError::Closed` after a previous invariant violation
    pub async fn dispatch(
        &mut self,
        operation: Operation,
        options: DispatchOptions,
    ) -> Result<Receipt, EngineError> {
        self.ensure_live()?;
        let command = match operation.into_command(
            &self.store,
            self.config.max_text_len,
            self.config.order_step,
        ) {
            Ok(command) => command.with_batch(options.batch_id),
            Err(err) => return Err(self.reject_member(err, options).await),
        };
        self.run_new(vec![command], options).await
    }

    /// Run several operations as one atomic unit
    ///
    /// All members share one batch id and form a single history entry. If any
    /// member fails, the store is left as it was before the batch, members
    /// already confirmed remotely are compensated, and history is unchanged.
    ///
    /// # Errors
    /// Same as [`Executor::dispatch`]; an empty batch is a validation error.
    pub async fn dispatch_batch(
        &mut self,
        operations: Vec<Operation>,
        options: DispatchOptions,
    ) -> Result<Receipt, EngineError> {
        self.ensure_live()?;
        if operations.is_empty() {
            return Err(self.reject(ValidationError::EmptyBatch.into()));
        }
        let batch_id = options.batch_id.unwrap_or_default();

        // Validate every member up front against the state the earlier
        // members will produce, so nothing reaches the remote on bad input.
        let mut scratch = self.store.clone();
        let mut commands = Vec::with_capacity(operations.len());
        for operation in operations {
            let command = match operation.into_command(
                &scratch,
                self.config.max_text_len,
                self.config.order_step,
            ) {
                Ok(command) => command.with_batch(Some(batch_id)),
                Err(err) => return Err(self.reject_member(err, options).await),
            };
            if let Ok(call) = command.forward_call(&scratch.effective()) {
                let effects = call.project(&scratch.effective());
                scratch.stage(&effects);
            }
            commands.push(command);
        }

        let options = DispatchOptions {
            batch_id: Some(batch_id),
            ..options
        };
        self.run_new(commands, options).await
    }

    /// Reverse the most recent history entry
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    ///
    /// # Errors
    /// On remote failure the entry goes back onto the undo stack and the
    /// error is recorded. A missing undo payload is an invariant violation.
    pub async fn undo(&mut self) -> Result<Option<Receipt>, EngineError> {
        self.ensure_live()?;
        let Some(entry) = self.history.pop_for_undo() else {
            return Ok(None);
        };
        let timeout = self.config.default_timeout();
        match self.reverse_entry(&entry, timeout).await {
            Ok(()) => {
                self.store.promote();
                self.store.clear_error();
                let receipt = Receipt::for_commands(entry.undo_order());
                info!(description = %receipt.description, "undo confirmed");
                self.history.commit_undo(entry);
                self.publish();
                Ok(Some(receipt))
            }
            Err(err) => {
                self.history.restore_undo(entry);
                self.publish();
                Err(err)
            }
        }
    }

    /// Replay the most recently undone entry
    ///
    /// Returns `Ok(None)` when there is nothing to redo.
    ///
    /// # Errors
    /// On remote failure the entry goes back onto the redo stack and the
    /// error is recorded.
    pub async fn redo(&mut self) -> Result<Option<Receipt>, EngineError> {
        self.ensure_live()?;
        let Some(entry) = self.history.pop_for_redo() else {
            return Ok(None);
        };
        let timeout = self.config.default_timeout();
        let optimistic = self.config.optimistic_by_default;
        match self
            .forward_all(entry.commands(), CallPurpose::Redo, optimistic, timeout)
            .await
        {
            Ok(()) => {
                self.store.promote();
                self.store.clear_error();
                let receipt = Receipt::for_commands(entry.redo_order());
                info!(description = %receipt.description, "redo confirmed");
                self.history.commit_redo(entry);
                self.publish();
                Ok(Some(receipt))
            }
            Err(err) => {
                self.history.restore_redo(entry);
                self.publish();
                Err(err)
            }
        }
    }

    /// Replace confirmed state with the remote's full list
    ///
    /// History is cleared: recorded commands refer to state that may no
    /// longer exist. Returns the number of items loaded.
    ///
    /// # Errors
    /// `EngineError::Command` if the fetch fails; the store keeps its items.
    pub async fn load(&mut self) -> Result<usize, EngineError> {
        self.ensure_live()?;
        self.store.set_loading(true);
        self.publish();

        let ctx = CallContext::new(CallPurpose::Load).with_timeout(self.config.default_timeout());
        let result = self.remote.call(RemoteCall::FetchAll, ctx).await;
        self.store.set_loading(false);

        match result {
            Ok(reply) => {
                let count = reply.items.len();
                self.store.replace_confirmed(reply.items);
                self.history.clear();
                self.store.clear_error();
                self.publish();
                info!(count, "items loaded");
                Ok(count)
            }
            Err(err) => {
                warn!(kind = %err.kind, error = %err.message, "load failed");
                self.store.set_error(err.clone());
                self.publish();
                Err(err.into())
            }
        }
    }

    /// Apply a selection edit; local only
    pub fn change_selection(&mut self, change: SelectionChange) {
        match change {
            SelectionChange::Select(ids) => {
                self.store.select(&ids);
            }
            SelectionChange::Deselect(ids) => self.store.deselect(&ids),
            SelectionChange::Toggle(id) => {
                self.store.toggle_selection(&id);
            }
            SelectionChange::All => self.store.select_all(),
            SelectionChange::Clear => self.store.clear_selection(),
        }
        self.publish();
    }

    /// Forget the recorded error
    pub fn clear_error(&mut self) {
        self.store.clear_error();
        self.publish();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn run_new(
        &mut self,
        commands: Vec<Command>,
        options: DispatchOptions,
    ) -> Result<Receipt, EngineError> {
        let optimistic = options.optimistic.unwrap_or(self.config.optimistic_by_default);
        let timeout = options.timeout.or_else(|| self.config.default_timeout());

        if let Err(err) = self
            .forward_all(&commands, CallPurpose::Execute, optimistic, timeout)
            .await
        {
            if let (Some(batch_id), false) = (options.batch_id, err.is_fatal()) {
                self.abort_batch(batch_id, &err, timeout).await?;
            }
            return Err(err);
        }

        self.store.promote();
        self.store.clear_error();
        let receipt = Receipt::for_commands(&commands);
        if options.skip_history {
            debug!(description = %receipt.description, "history skipped");
        } else {
            for command in commands {
                self.history
                    .push(command)
                    .map_err(|err| self.fatal(err.into()))?;
            }
        }
        self.publish();
        info!(
            description = %receipt.description,
            commands = receipt.command_ids.len(),
            "dispatch confirmed"
        );
        Ok(receipt)
    }

    /// Run forward actions in order, leaving confirmed effects pending
    async fn forward_all(
        &mut self,
        commands: &[Command],
        purpose: CallPurpose,
        optimistic: bool,
        timeout: Option<Duration>,
    ) -> Result<(), EngineError> {
        for (done, command) in commands.iter().enumerate() {
            let before = self.store.clone();
            let source = before.effective();

            let call = match command.forward_call(&source) {
                Ok(call) => call,
                Err(err) => {
                    let compensation = inverse_calls(&commands[..done]);
                    return Err(self.fail(err, compensation, timeout).await);
                }
            };
            let projected = call.project(&source);
            if optimistic {
                self.store.stage(&projected);
                self.publish();
                debug!(command = %command.id(), effects = projected.len(), "optimistic effects staged");
            }

            let ctx = CallContext::new(purpose).with_timeout(timeout);
            let result = command
                .execute(self.remote.as_ref(), ctx, &source)
                .await
                .with_rollback(targets_before(&source, &call));
            self.emit(CommandEvent::new(command, purpose, &result));
            match result.into_result() {
                Ok(reply) => {
                    command
                        .capture_undo(&source, &reply)
                        .map_err(|err| self.fatal(err.into()))?;
                    let canonical = call.reconcile(projected.clone(), &reply);
                    self.store.settle(&projected, &canonical);
                    self.publish();
                }
                Err(err) => {
                    let compensation = inverse_calls(&commands[..done]);
                    return Err(self.fail(err, compensation, timeout).await);
                }
            }
        }
        Ok(())
    }

    /// Run inverse actions of an entry in reverse order
    async fn reverse_entry(
        &mut self,
        entry: &HistoryEntry,
        timeout: Option<Duration>,
    ) -> Result<(), EngineError> {
        let commands: Vec<&Command> = entry.undo_order().collect();
        for (done, command) in commands.iter().enumerate() {
            let call = command
                .inverse_call()
                .map_err(|err| self.fatal(err.into()))?;
            let before = self.store.clone();
            let projected = call.project(&before.effective());
            if self.config.optimistic_by_default {
                self.store.stage(&projected);
                self.publish();
            }

            let ctx = CallContext::new(CallPurpose::Undo).with_timeout(timeout);
            let result = command
                .undo(self.remote.as_ref(), ctx)
                .await
                .map_err(|err| self.fatal(err.into()))?
                .with_rollback(targets_before(&before.effective(), &call));
            self.emit(CommandEvent::new(command, CallPurpose::Undo, &result));
            match result.into_result() {
                Ok(reply) => {
                    let canonical = call.reconcile(projected.clone(), &reply);
                    self.store.settle(&projected, &canonical);
                    self.publish();
                }
                Err(err) => {
                    // Re-apply what was already reversed, newest first
                    let source = self.store.clone();
                    let compensation = commands[..done]
                        .iter()
                        .rev()
                        .filter_map(|c| {
                            c.forward_call(&source.effective())
                                .ok()
                                .map(|call| (c.id(), call))
                        })
                        .collect();
                    return Err(self.fail(err, compensation, timeout).await);
                }
            }
        }
        Ok(())
    }

    /// Reverse earlier members of a failed batch that are already recorded
    ///
    /// Members dispatched one by one under a shared batch id sit in the top
    /// undo entry. They are undone remotely and dropped from history. If that
    /// reversal fails too, the entry stays on the undo stack so the caller
    /// can still undo it.
    async fn abort_batch(
        &mut self,
        batch_id: BatchId,
        cause: &EngineError,
        timeout: Option<Duration>,
    ) -> Result<(), EngineError> {
        let Some(entry) = self.history.take_batch(batch_id) else {
            return Ok(());
        };
        match self.reverse_entry(&entry, timeout).await {
            Ok(()) => {
                self.store.promote();
                warn!(
                    batch = %batch_id,
                    commands = entry.len(),
                    "batch member failed, earlier members reversed"
                );
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                error!(
                    batch = %batch_id,
                    error = %err,
                    "could not reverse earlier batch members; they stay in history"
                );
                self.history.restore_undo(entry);
            }
        }
        if let Some(cause) = cause.command_error() {
            self.store.set_error(cause.clone());
        }
        self.publish();
        Ok(())
    }

    /// Roll back local state, compensate the remote, record the error
    async fn fail(
        &mut self,
        err: CommandError,
        compensation: Vec<(CommandId, RemoteCall)>,
        timeout: Option<Duration>,
    ) -> EngineError {
        self.store.discard();
        self.store.set_error(err.clone());
        self.publish();

        if err.kind == CommandErrorKind::Unknown {
            error!(kind = %err.kind, error = %err.message, "command failed");
        } else {
            warn!(
                kind = %err.kind,
                retryable = err.retryable,
                error = %err.message,
                "command failed, optimistic state rolled back"
            );
        }

        for (command_id, call) in compensation {
            let ctx = CallContext::new(CallPurpose::Compensate)
                .for_command(command_id)
                .with_timeout(timeout);
            let name = call.name();
            if let Err(comp_err) = self.remote.call(call, ctx).await {
                error!(
                    command = %command_id,
                    call = name,
                    error = %comp_err,
                    "compensation failed; remote may diverge from local state"
                );
            }
        }
        EngineError::Command(err)
    }

    /// Record a validation failure
    fn reject(&mut self, err: CommandError) -> EngineError {
        debug!(error = %err.message, "operation rejected");
        self.store.set_error(err.clone());
        self.publish();
        EngineError::Command(err)
    }

    /// Record a validation failure; a member of a batch also backs it out
    async fn reject_member(&mut self, err: CommandError, options: DispatchOptions) -> EngineError {
        let err = self.reject(err);
        if let Some(batch_id) = options.batch_id {
            let timeout = options.timeout.or_else(|| self.config.default_timeout());
            if let Err(fatal) = self.abort_batch(batch_id, &err, timeout).await {
                return fatal;
            }
        }
        err
    }

    fn fatal(&mut self, err: EngineError) -> EngineError {
        error!(error = %err, "invariant violated, executor stopping");
        self.store.discard();
        self.fault = Some(err.to_string());
        self.publish();
        err
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.fault.is_some() {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn emit(&self, event: CommandEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.views
            .send_replace(EngineView::capture(&self.store, &self.history));
    }
}

/// Targets of `call` as `source` holds them
fn targets_before(source: &dyn ItemSource, call: &RemoteCall) -> Vec<Item> {
    call.target_ids()
        .iter()
        .filter_map(|id| source.get_item(id))
        .collect()
}

/// Inverse calls for confirmed commands, newest first
fn inverse_calls(confirmed: &[Command]) -> Vec<(CommandId, RemoteCall)> {
    confirmed
        .iter()
        .rev()
        .filter_map(|c| match c.inverse_call() {
            Ok(call) => Some((c.id(), call)),
            Err(err) => {
                error!(error = %err, "cannot compensate command");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::InMemoryRemote;
    use pretty_assertions::assert_eq;
    use retrace_model::ItemPatch;

    fn seeded() -> (Arc<InMemoryRemote>, Executor) {
        let items = vec![
            Item::new("t1", "Write report", 1024),
            Item::new("t2", "Call bank", 2048),
        ];
        let remote = Arc::new(InMemoryRemote::new().with_items(items.clone()));
        let executor = Executor::new(remote.clone(), EngineConfig::default()).with_items(items);
        (remote, executor)
    }

    #[tokio::test]
    async fn toggle_undo_redo_cycle() {
        let (_remote, mut executor) = seeded();

        executor
            .dispatch(Operation::toggle("t1"), DispatchOptions::new())
            .await
            .unwrap();
        let view = executor.view();
        assert!(view.items()[&ItemId::from("t1")].completed);
        assert!(view.can_undo);
        assert!(!view.can_redo);
        assert!(view.pending().is_empty());

        executor.undo().await.unwrap().unwrap();
        let view = executor.view();
        assert!(!view.items()[&ItemId::from("t1")].completed);
        assert!(!view.can_undo);
        assert!(view.can_redo);

        executor.redo().await.unwrap().unwrap();
        let view = executor.view();
        assert!(view.items()[&ItemId::from("t1")].completed);
        assert!(view.can_undo);
        assert!(!view.can_redo);
    }

    #[tokio::test]
    async fn failed_update_rolls_back() {
        let (remote, mut executor) = seeded();
        remote.fail_next(CommandError::network("connection reset"));

        let err = executor
            .dispatch(
                Operation::update("t1", ItemPatch::new().with_text("Rewrite report")),
                DispatchOptions::new(),
            )
            .await
            .unwrap_err();

        assert!(!err.is_fatal());
        assert!(err.is_retryable());
        let view = executor.view();
        assert_eq!(view.items()[&ItemId::from("t1")].text, "Write report");
        assert!(view.pending().is_empty());
        assert!(!view.can_undo);
        assert_eq!(view.last_error().map(|e| e.kind), Some(CommandErrorKind::Network));
    }

    #[tokio::test]
    async fn validation_never_reaches_remote() {
        let (remote, mut executor) = seeded();
        let err = executor
            .dispatch(Operation::add("   "), DispatchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.command_error().map(|e| e.kind), Some(CommandErrorKind::Validation));
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_stacks_return_none() {
        let (_remote, mut executor) = seeded();
        assert_eq!(executor.undo().await.unwrap(), None);
        assert_eq!(executor.redo().await.unwrap(), None);
    }

    #[tokio::test]
    async fn skip_history_leaves_stacks_alone() {
        let (_remote, mut executor) = seeded();
        executor
            .dispatch(Operation::toggle("t1"), DispatchOptions::new())
            .await
            .unwrap();
        executor.undo().await.unwrap();
        assert!(executor.history().can_redo());

        executor
            .dispatch(Operation::toggle("t2"), DispatchOptions::new().skip_history())
            .await
            .unwrap();
        assert!(executor.history().can_redo());
        assert_eq!(executor.history().undo_len(), 0);
        assert!(executor.store().confirmed()[&ItemId::from("t2")].completed);
    }

    #[tokio::test]
    async fn optimistic_effect_is_visible_while_in_flight() {
        let (remote, mut executor) = seeded();
        let views = executor.subscribe();
        remote.delay_next(Duration::from_millis(100));

        let (result, ()) = tokio::join!(
            executor.dispatch(Operation::delete("t2"), DispatchOptions::new()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let view = views.borrow();
                assert!(view.get(&"t2".into()).is_none());
                assert!(view.is_pending(&"t2".into()));
                assert!(view.items().contains_key(&ItemId::from("t2")));
            }
        );
        result.unwrap();
        assert!(!executor.store().confirmed().contains_key(&ItemId::from("t2")));
    }

    #[tokio::test]
    async fn non_optimistic_dispatch_waits_for_reply() {
        let (remote, mut executor) = seeded();
        let views = executor.subscribe();
        remote.delay_next(Duration::from_millis(100));

        let (result, ()) = tokio::join!(
            executor.dispatch(
                Operation::delete("t2"),
                DispatchOptions::new().with_optimistic(false),
            ),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let view = views.borrow();
                assert!(view.get(&"t2".into()).is_some());
                assert!(view.pending().is_empty());
            }
        );
        result.unwrap();
        assert_eq!(executor.store().stats().total, 1);
    }

    #[tokio::test]
    async fn load_replaces_items_and_clears_history() {
        let (remote, mut executor) = seeded();
        executor
            .dispatch(Operation::toggle("t1"), DispatchOptions::new())
            .await
            .unwrap();
        remote.seed(vec![Item::new("x", "From server", 1)]);

        let count = executor.load().await.unwrap();
        assert_eq!(count, 1);
        let view = executor.view();
        assert!(!view.can_undo);
        assert!(!view.loading());
        assert_eq!(view.visible_items().len(), 1);
    }

    #[tokio::test]
    async fn selection_drives_bulk_operations() {
        let (_remote, mut executor) = seeded();
        executor.change_selection(SelectionChange::All);
        let receipt = executor
            .dispatch(
                Operation::SetSelectedCompleted { completed: true },
                DispatchOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.description, "Complete 2 items");
        assert_eq!(executor.store().stats().completed, 2);

        executor
            .dispatch(Operation::DeleteSelected, DispatchOptions::new())
            .await
            .unwrap();
        assert!(executor.store().selection().is_empty());
        assert_eq!(executor.store().stats().total, 0);
    }

    #[tokio::test]
    async fn failed_member_backs_out_earlier_batch_dispatches() {
        let (remote, mut executor) = seeded();
        let batch = BatchId::new();
        executor
            .dispatch(Operation::toggle("t1"), DispatchOptions::new().with_batch(batch))
            .await
            .unwrap();
        assert_eq!(executor.history().undo_len(), 1);

        remote.fail_next(CommandError::network("connection reset"));
        let err = executor
            .dispatch(Operation::delete("t2"), DispatchOptions::new().with_batch(batch))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        assert_eq!(executor.history().undo_len(), 0);
        assert!(!executor.store().confirmed()[&ItemId::from("t1")].completed);
        assert!(executor.store().confirmed().contains_key(&ItemId::from("t2")));
        assert!(executor.store().pending().is_empty());
        assert_eq!(remote.get(&"t1".into()).map(|i| i.completed), Some(false));
        assert_eq!(
            executor.store().last_error().map(|e| e.kind),
            Some(CommandErrorKind::Network)
        );
    }

    #[tokio::test]
    async fn invalid_member_backs_out_earlier_batch_dispatches() {
        let (_remote, mut executor) = seeded();
        let batch = BatchId::new();
        executor
            .dispatch(Operation::toggle("t1"), DispatchOptions::new().with_batch(batch))
            .await
            .unwrap();
        executor
            .dispatch(Operation::toggle("ghost"), DispatchOptions::new().with_batch(batch))
            .await
            .unwrap_err();
        assert!(!executor.history().can_undo());
        assert!(!executor.store().confirmed()[&ItemId::from("t1")].completed);
    }

    #[tokio::test]
    async fn other_batches_are_left_alone_on_failure() {
        let (remote, mut executor) = seeded();
        executor
            .dispatch(
                Operation::toggle("t1"),
                DispatchOptions::new().with_batch(BatchId::new()),
            )
            .await
            .unwrap();
        remote.fail_next(CommandError::network("connection reset"));
        executor
            .dispatch(
                Operation::delete("t2"),
                DispatchOptions::new().with_batch(BatchId::new()),
            )
            .await
            .unwrap_err();
        assert_eq!(executor.history().undo_len(), 1);
        assert!(executor.store().confirmed()[&ItemId::from("t1")].completed);
    }

    #[tokio::test]
    async fn events_report_outcomes_with_rollback_data() {
        let (remote, mut executor) = seeded();
        let mut events = executor.events();

        executor
            .dispatch(Operation::toggle("t1"), DispatchOptions::new())
            .await
            .unwrap();
        let event = events.try_recv().unwrap();
        assert!(event.success);
        assert_eq!(event.purpose, CallPurpose::Execute);
        assert_eq!(event.kind, retrace_command::CommandKind::Toggle);
        assert_eq!(event.rollback.len(), 1);
        assert!(!event.rollback[0].completed);

        remote.fail_next(CommandError::conflict("stale"));
        executor
            .dispatch(Operation::delete("t2"), DispatchOptions::new())
            .await
            .unwrap_err();
        let event = events.try_recv().unwrap();
        assert!(event.rolled_back());
        assert_eq!(event.error.map(|e| e.kind), Some(CommandErrorKind::Conflict));
        assert_eq!(event.rollback[0].id, ItemId::from("t2"));

        executor.undo().await.unwrap().unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(event.purpose, CallPurpose::Undo);
        assert!(event.success);
        assert!(event.rollback[0].completed);
        assert!(events.try_recv().is_err());
    }
}
