//! Retrace Engine - optimistic, undoable edits to a remote item list
//!
//! The engine turns caller [`Operation`]s into reversible commands, applies
//! their effect to a local [`ItemStateStore`] before the remote confirms,
//! and reconciles or rolls back once it answers. Confirmed commands land in
//! a bounded undo history.
//!
//! Requests are served one at a time, in arrival order, by a single worker
//! task. Readers observe immutable [`EngineView`] snapshots and a stream of
//! per-command [`CommandEvent`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use retrace_engine::{DispatchOptions, Engine, EngineConfig, Operation};
//! use retrace_engine::sim::InMemoryRemote;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), retrace_engine::EngineError> {
//! let remote = Arc::new(InMemoryRemote::new());
//! let engine = Engine::new(remote, EngineConfig::default())?;
//!
//! let receipt = engine.dispatch(Operation::add("Buy milk"), DispatchOptions::new()).await?;
//! println!("{}", receipt.description);
//!
//! engine.undo().await?;
//! assert!(engine.view().visible_items().is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod executor;
pub mod operation;
pub mod sim;
pub mod store;
pub mod view;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use event::CommandEvent;
pub use executor::{Executor, Receipt, SelectionChange};
pub use operation::{DispatchOptions, Operation};
pub use store::{Effective, ItemStateStore, StoreStats};
pub use view::EngineView;

// Re-exports for convenience
pub use retrace_command::{
    BatchId, CallContext, CallPurpose, Command, CommandError, CommandErrorKind, CommandId,
    RemoteCall, RemoteReply, RemoteService,
};
pub use retrace_model::{Item, ItemId, ItemPatch, NewItem, Priority};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving an engine
    pub use crate::{
        CommandEvent, DispatchOptions, Engine, EngineConfig, EngineError, EngineView, Item, ItemId,
        ItemPatch, NewItem, Operation, Priority, Receipt, RemoteService,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
