//! Retrace History - bounded undo/redo stacks
//!
//! [`History`] tracks confirmed commands as [`HistoryEntry`] units. Commands
//! sharing a batch id form one unit: they undo together in reverse order and
//! redo together in original order.
//!
//! # Example
//!
//! ```rust
//! use retrace_command::{Command, RemoteReply};
//! use retrace_history::History;
//! use retrace_model::{Item, ItemId};
//! use std::collections::BTreeMap;
//!
//! let mut before = BTreeMap::new();
//! before.insert(ItemId::from("t1"), Item::new("t1", "Write report", 1024));
//!
//! let cmd = Command::toggle("t1".into());
//! cmd.capture_undo(&before, &RemoteReply::empty()).unwrap();
//!
//! let mut history = History::new(50);
//! history.push(cmd).unwrap();
//! assert!(history.can_undo());
//! assert_eq!(history.last_executed_description(), Some("Toggle item t1"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod history;

pub use error::HistoryError;
pub use history::{History, HistoryEntry};

/// Default undo-entry cap
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
