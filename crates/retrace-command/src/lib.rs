//! Retrace Command - reversible units of work
//!
//! A [`Command`] knows how to perform its forward action against a
//! [`RemoteService`] and, once that action has been confirmed, how to perform
//! the inverse. The undo payload is captured exactly once and never changes,
//! so repeated undo/redo cycles always replay the same remote actions.
//!
//! # Example
//!
//! ```rust
//! use retrace_command::{Command, RemoteCall, RemoteReply};
//! use retrace_model::{Item, ItemId};
//! use std::collections::BTreeMap;
//!
//! let mut before = BTreeMap::new();
//! before.insert(ItemId::from("t1"), Item::new("t1", "Write report", 1024));
//!
//! let cmd = Command::toggle("t1".into());
//! assert!(!cmd.can_undo());
//!
//! // The forward action was confirmed by the remote
//! cmd.capture_undo(&before, &RemoteReply::empty()).unwrap();
//! assert_eq!(
//!     cmd.inverse_call().unwrap(),
//!     RemoteCall::SetCompleted { changes: vec![("t1".into(), false)] },
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod action;
pub mod command;
pub mod error;
pub mod ids;
pub mod remote;

pub use action::{
    Action, AddItem, BulkDelete, BulkToggle, DeleteItem, ReorderItem, ToggleItem, UpdateItem,
};
pub use command::{Command, CommandKind, CommandMetadata, CommandResult};
pub use error::{CommandError, CommandErrorKind, MissingUndoPayload};
pub use ids::{BatchId, CommandId};
pub use remote::{CallContext, CallPurpose, Effect, RemoteCall, RemoteReply, RemoteService};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with commands
    pub use crate::{
        BatchId, CallContext, CallPurpose, Command, CommandError, CommandErrorKind, CommandId,
        RemoteCall, RemoteReply, RemoteService,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
