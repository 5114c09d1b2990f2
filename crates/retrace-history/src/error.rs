//! History errors

use retrace_command::CommandId;
use thiserror::Error;

/// Rejected history mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Only confirmed commands (undo payload captured) may enter history
    #[error("command {0} was not confirmed and cannot enter history")]
    Unconfirmed(CommandId),

    /// A history entry needs at least one command
    #[error("history entry has no commands")]
    Empty,
}
