//! Engine handle
//!
//! The [`Engine`] owns an [`Executor`] inside one worker task. Requests go
//! through a bounded FIFO queue and are processed strictly in admission
//! order, one at a time. Each request carries a oneshot channel for its
//! reply. Observers read snapshots from a watch channel and never touch the
//! executor directly.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::CommandEvent;
use crate::executor::{Executor, Receipt, SelectionChange};
use crate::operation::{DispatchOptions, Operation};
use crate::view::EngineView;
use retrace_command::RemoteService;
use retrace_model::ItemId;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info};

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Messages sent to the worker
enum Request {
    Dispatch {
        operation: Operation,
        options: DispatchOptions,
        reply: Reply<Receipt>,
    },
    DispatchBatch {
        operations: Vec<Operation>,
        options: DispatchOptions,
        reply: Reply<Receipt>,
    },
    Undo {
        reply: Reply<Option<Receipt>>,
    },
    Redo {
        reply: Reply<Option<Receipt>>,
    },
    Load {
        reply: Reply<usize>,
    },
    Selection {
        change: SelectionChange,
        reply: Reply<()>,
    },
    ClearError {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

impl Request {
    /// Answer with `Closed` without running
    fn reject(self) {
        match self {
            Self::Dispatch { reply, .. } | Self::DispatchBatch { reply, .. } => {
                let _ = reply.send(Err(EngineError::Closed));
            }
            Self::Undo { reply } | Self::Redo { reply } => {
                let _ = reply.send(Err(EngineError::Closed));
            }
            Self::Load { reply } => {
                let _ = reply.send(Err(EngineError::Closed));
            }
            Self::Selection { reply, .. } | Self::ClearError { reply } | Self::Shutdown { reply } => {
                let _ = reply.send(Err(EngineError::Closed));
            }
        }
    }
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct Engine {
    requests: mpsc::Sender<Request>,
    views: watch::Receiver<EngineView>,
    events: broadcast::Sender<CommandEvent>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("closed", &self.requests.is_closed())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate `config` and start an engine with an empty store
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// `EngineError::Config` if the configuration is invalid.
    pub fn new(remote: Arc<dyn RemoteService>, config: EngineConfig) -> Result<Self, EngineError> {
        Self::spawn(Executor::new(remote, config))
    }

    /// Start the worker for an existing executor
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// `EngineError::Config` if the executor's configuration is invalid.
    pub fn spawn(executor: Executor) -> Result<Self, EngineError> {
        executor.config().validate()?;
        let (requests, queue) = mpsc::channel(executor.config().queue_capacity);
        let views = executor.subscribe();
        let events = executor.event_sender();
        tokio::spawn(run_worker(executor, queue));
        Ok(Self {
            requests,
            views,
            events,
        })
    }

    /// Run one operation
    ///
    /// # Errors
    /// See [`Executor::dispatch`]; `EngineError::Closed` once the worker
    /// has stopped.
    pub async fn dispatch(
        &self,
        operation: Operation,
        options: DispatchOptions,
    ) -> Result<Receipt, EngineError> {
        self.request(|reply| Request::Dispatch {
            operation,
            options,
            reply,
        })
        .await
    }

    /// Run several operations as one atomic unit
    ///
    /// # Errors
    /// See [`Executor::dispatch_batch`].
    pub async fn dispatch_batch(
        &self,
        operations: Vec<Operation>,
        options: DispatchOptions,
    ) -> Result<Receipt, EngineError> {
        self.request(|reply| Request::DispatchBatch {
            operations,
            options,
            reply,
        })
        .await
    }

    /// Reverse the most recent history entry; `None` if there is none
    ///
    /// # Errors
    /// See [`Executor::undo`].
    pub async fn undo(&self) -> Result<Option<Receipt>, EngineError> {
        self.request(|reply| Request::Undo { reply }).await
    }

    /// Replay the most recently undone entry; `None` if there is none
    ///
    /// # Errors
    /// See [`Executor::redo`].
    pub async fn redo(&self) -> Result<Option<Receipt>, EngineError> {
        self.request(|reply| Request::Redo { reply }).await
    }

    /// Fetch the full list from the remote
    ///
    /// # Errors
    /// See [`Executor::load`].
    pub async fn load(&self) -> Result<usize, EngineError> {
        self.request(|reply| Request::Load { reply }).await
    }

    /// Add visible ids to the selection
    ///
    /// # Errors
    /// `EngineError::Closed` once the worker has stopped.
    pub async fn select(&self, ids: Vec<ItemId>) -> Result<(), EngineError> {
        self.change_selection(SelectionChange::Select(ids)).await
    }

    /// Remove ids from the selection
    ///
    /// # Errors
    /// `EngineError::Closed` once the worker has stopped.
    pub async fn deselect(&self, ids: Vec<ItemId>) -> Result<(), EngineError> {
        self.change_selection(SelectionChange::Deselect(ids)).await
    }

    /// Flip selection of one id
    ///
    /// # Errors
    /// `EngineError::Closed` once the worker has stopped.
    pub async fn toggle_selection(&self, id: ItemId) -> Result<(), EngineError> {
        self.change_selection(SelectionChange::Toggle(id)).await
    }

    /// Select every visible item
    ///
    /// # Errors
    /// `EngineError::Closed` once the worker has stopped.
    pub async fn select_all(&self) -> Result<(), EngineError> {
        self.change_selection(SelectionChange::All).await
    }

    /// Empty the selection
    ///
    /// # Errors
    /// `EngineError::Closed` once the worker has stopped.
    pub async fn clear_selection(&self) -> Result<(), EngineError> {
        self.change_selection(SelectionChange::Clear).await
    }

    /// Forget the recorded error
    ///
    /// # Errors
    /// `EngineError::Closed` once the worker has stopped.
    pub async fn clear_error(&self) -> Result<(), EngineError> {
        self.request(|reply| Request::ClearError { reply }).await
    }

    /// Stop the worker after the requests queued before this one
    ///
    /// # Errors
    /// `EngineError::Closed` if the worker had already stopped.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| Request::Shutdown { reply }).await
    }

    /// Latest snapshot
    #[must_use]
    pub fn view(&self) -> EngineView {
        self.views.borrow().clone()
    }

    /// Snapshot stream
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.views.clone()
    }

    /// Command outcome stream, starting now
    ///
    /// A subscriber that falls more than
    /// [`EVENT_CAPACITY`](crate::event::EVENT_CAPACITY) events behind sees
    /// `RecvError::Lagged` and skips ahead.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    /// True once the worker has stopped
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    async fn change_selection(&self, change: SelectionChange) -> Result<(), EngineError> {
        self.request(|reply| Request::Selection { change, reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(build(tx))
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)?
    }
}

async fn run_worker(mut executor: Executor, mut queue: mpsc::Receiver<Request>) {
    info!("engine worker started");
    while let Some(request) = queue.recv().await {
        let fatal = match request {
            Request::Dispatch {
                operation,
                options,
                reply,
            } => respond(reply, executor.dispatch(operation, options).await),
            Request::DispatchBatch {
                operations,
                options,
                reply,
            } => respond(reply, executor.dispatch_batch(operations, options).await),
            Request::Undo { reply } => respond(reply, executor.undo().await),
            Request::Redo { reply } => respond(reply, executor.redo().await),
            Request::Load { reply } => respond(reply, executor.load().await),
            Request::Selection { change, reply } => {
                executor.change_selection(change);
                respond(reply, Ok(()))
            }
            Request::ClearError { reply } => {
                executor.clear_error();
                respond(reply, Ok(()))
            }
            Request::Shutdown { reply } => {
                let _ = reply.send(Ok(()));
                break;
            }
        };
        if fatal {
            error!("engine worker stopping after invariant violation");
            break;
        }
    }

    // Anything still queued is answered with `Closed`
    queue.close();
    while let Some(request) = queue.recv().await {
        request.reject();
    }
    info!("engine worker stopped");
}

/// Send the reply; true if the result is fatal
fn respond<T>(reply: Reply<T>, result: Result<T, EngineError>) -> bool {
    let fatal = matches!(&result, Err(err) if err.is_fatal());
    // The caller may have stopped waiting
    let _ = reply.send(result);
    fatal
}
