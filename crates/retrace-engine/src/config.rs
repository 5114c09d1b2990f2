//! Engine configuration

use crate::error::EngineError;
use retrace_model::DEFAULT_MAX_TEXT_LEN;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Undo entries kept before the oldest is evicted
    pub max_history_size: usize,
    /// Requests the admission queue buffers before callers wait
    pub queue_capacity: usize,
    /// Deadline hint forwarded to the remote when a dispatch sets none
    pub default_timeout_ms: Option<u64>,
    /// Whether dispatches apply their effect before the remote answers
    pub optimistic_by_default: bool,
    /// Longest accepted item text, in characters
    pub max_text_len: usize,
    /// Gap between order values of appended items
    pub order_step: i64,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// `EngineError::Config` on malformed TOML or out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `EngineError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_history_size == 0 {
            return Err(EngineError::Config("max_history_size must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::Config("queue_capacity must be at least 1".into()));
        }
        if self.max_text_len == 0 {
            return Err(EngineError::Config("max_text_len must be at least 1".into()));
        }
        if self.order_step <= 0 {
            return Err(EngineError::Config("order_step must be positive".into()));
        }
        Ok(())
    }

    /// Default deadline hint
    #[inline]
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// With history cap
    #[inline]
    #[must_use]
    pub fn with_max_history_size(mut self, max: usize) -> Self {
        self.max_history_size = max;
        self
    }

    /// With queue capacity
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// With default deadline hint
    #[inline]
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// With optimistic default
    #[inline]
    #[must_use]
    pub fn with_optimistic_by_default(mut self, optimistic: bool) -> Self {
        self.optimistic_by_default = optimistic;
        self
    }

    /// With text length limit
    #[inline]
    #[must_use]
    pub fn with_max_text_len(mut self, max: usize) -> Self {
        self.max_text_len = max;
        self
    }

    /// With order step
    #[inline]
    #[must_use]
    pub fn with_order_step(mut self, step: i64) -> Self {
        self.order_step = step;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history_size: retrace_history::DEFAULT_MAX_HISTORY,
            queue_capacity: 64,
            default_timeout_ms: Some(10_000),
            optimistic_by_default: true,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            order_step: 1024,
        }
    }
}
