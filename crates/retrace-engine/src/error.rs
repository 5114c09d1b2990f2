//! Engine errors
//!
//! Remote and validation failures are ordinary [`CommandError`]s: the
//! executor has already reverted its optimistic state when one is returned.
//! [`EngineError::Invariant`] marks a logic defect; the engine stops after
//! reporting it.

use retrace_command::{CommandError, MissingUndoPayload};
use retrace_history::HistoryError;

/// Main engine error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A command failed; state was rolled back
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Internal consistency was violated
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The engine worker is gone
    #[error("engine is closed")]
    Closed,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Check if the engine can no longer be used
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Check if the caller may retry the same request
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Command(err) if err.is_retryable())
    }

    /// Underlying command error, if any
    #[inline]
    #[must_use]
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MissingUndoPayload> for EngineError {
    fn from(err: MissingUndoPayload) -> Self {
        Self::Invariant(err.to_string())
    }
}

impl From<HistoryError> for EngineError {
    fn from(err: HistoryError) -> Self {
        Self::Invariant(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_command::{CommandId, CommandKind};

    #[test]
    fn classification() {
        let network = EngineError::from(CommandError::network("offline"));
        assert!(network.is_retryable());
        assert!(!network.is_fatal());

        let conflict = EngineError::from(CommandError::conflict("stale"));
        assert!(!conflict.is_retryable());

        let fatal = EngineError::from(MissingUndoPayload {
            command_id: CommandId::new(),
            kind: CommandKind::Delete,
        });
        assert!(fatal.is_fatal());
        assert!(!fatal.is_retryable());
        assert!(fatal.command_error().is_none());
    }
}
