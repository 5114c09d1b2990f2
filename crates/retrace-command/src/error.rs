//! Error types for command execution
//!
//! Every remote failure is classified into a [`CommandErrorKind`] and carries
//! a retry-eligibility flag. Retrying is always the caller's decision; the
//! engine itself never retries.

use crate::command::CommandKind;
use crate::ids::CommandId;
use retrace_model::ValidationError;
use serde::{Deserialize, Serialize};

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandErrorKind {
    /// Transport failure; transient
    Network,
    /// Malformed request; never dispatched
    Validation,
    /// Remote state diverged; caller must reconcile
    Conflict,
    /// Remote call exceeded its deadline
    Timeout,
    /// Anything else
    Unknown,
}

impl CommandErrorKind {
    /// Retry eligibility when the reporter does not say otherwise
    #[inline]
    #[must_use]
    pub fn default_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    /// Stable label
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for CommandErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed command, as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CommandError {
    /// Classification
    pub kind: CommandErrorKind,
    /// Human-readable message
    pub message: String,
    /// Command that failed, once known
    pub command_id: Option<CommandId>,
    /// Whether re-issuing the same request may succeed
    pub retryable: bool,
    /// Extra structured context from the reporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl CommandError {
    /// Create an error with the kind's default retry eligibility
    #[must_use]
    pub fn new(kind: CommandErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            command_id: None,
            retryable: kind.default_retryable(),
            context: None,
        }
    }

    /// Network failure
    #[inline]
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Network, message)
    }

    /// Validation failure
    #[inline]
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Validation, message)
    }

    /// Conflict with remote state
    #[inline]
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Conflict, message)
    }

    /// Deadline exceeded
    #[inline]
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Timeout, message)
    }

    /// Unclassified failure
    #[inline]
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Unknown, message)
    }

    /// Attach the failing command id (keeps an id already set)
    #[inline]
    #[must_use]
    pub fn with_command(mut self, command_id: CommandId) -> Self {
        self.command_id.get_or_insert(command_id);
        self
    }

    /// Override retry eligibility
    #[inline]
    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attach structured context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Validation and conflict errors end the request for good
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, CommandErrorKind::Validation | CommandErrorKind::Conflict)
    }
}

impl From<ValidationError> for CommandError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Undo requested for a command whose forward action was never confirmed
///
/// This is a logic defect in the caller, not a user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command {command_id} ({kind}) has no captured undo payload")]
pub struct MissingUndoPayload {
    /// Offending command
    pub command_id: CommandId,
    /// Its variant
    pub kind: CommandKind,
}
