//! Per-command outcome events
//!
//! The executor publishes one [`CommandEvent`] for every remote action a
//! command performs (execute, undo, redo). Views say what the list looks
//! like; events say which command produced it and what was rolled back.

use chrono::{DateTime, Utc};
use retrace_command::{
    BatchId, CallPurpose, Command, CommandError, CommandId, CommandKind, CommandResult,
};
use retrace_model::Item;
use serde::Serialize;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 256;

/// Outcome of one command's remote action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandEvent {
    /// Command that ran
    pub command_id: CommandId,
    /// Its variant
    pub kind: CommandKind,
    /// Execute, undo or redo
    pub purpose: CallPurpose,
    /// Grouping key, if any
    pub batch_id: Option<BatchId>,
    /// Whether the remote accepted the action
    pub success: bool,
    /// Classified failure
    pub error: Option<CommandError>,
    /// Targets as they were before the action; empty when none existed yet
    pub rollback: Vec<Item>,
    /// When the outcome was known
    pub at: DateTime<Utc>,
}

impl CommandEvent {
    pub(crate) fn new(command: &Command, purpose: CallPurpose, result: &CommandResult) -> Self {
        Self {
            command_id: command.id(),
            kind: command.kind(),
            purpose,
            batch_id: command.batch_id(),
            success: result.success,
            error: result.error.clone(),
            rollback: result.rollback.clone().unwrap_or_default(),
            at: Utc::now(),
        }
    }

    /// True if the optimistic change was reverted
    #[inline]
    #[must_use]
    pub fn rolled_back(&self) -> bool {
        !self.success
    }
}
