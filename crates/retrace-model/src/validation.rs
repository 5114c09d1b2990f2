//! Request validation

use crate::item::ItemId;

/// Default upper bound on item text length, in characters
pub const DEFAULT_MAX_TEXT_LEN: usize = 500;

/// Malformed request; never reaches the remote service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Text is empty after trimming
    #[error("item text must not be empty")]
    EmptyText,

    /// Text exceeds the configured limit
    #[error("item text is {len} characters, limit is {max}")]
    TextTooLong {
        /// Actual length
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Update carries no field changes
    #[error("update does not change any field")]
    EmptyPatch,

    /// Bulk operation has no targets
    #[error("bulk operation needs at least one target")]
    NoTargets,

    /// Target id is not a confirmed item
    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    /// Batch contains no operations
    #[error("batch is empty")]
    EmptyBatch,
}

/// Check trimmed text against the length limit
///
/// # Errors
/// - [`ValidationError::EmptyText`] if blank
/// - [`ValidationError::TextTooLong`] if over `max_len` characters
pub fn validate_text(text: &str, max_len: usize) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(ValidationError::TextTooLong { len, max: max_len });
    }
    Ok(())
}

/// Trim, lowercase and dedupe tags, dropping empty ones; keeps first-seen order
#[must_use]
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(validate_text("   ", 10), Err(ValidationError::EmptyText));
        assert!(validate_text(" ok ", 10).is_ok());
    }

    #[test]
    fn long_text_is_rejected() {
        let err = validate_text("abcdef", 3).unwrap_err();
        assert_eq!(err, ValidationError::TextTooLong { len: 6, max: 3 });
        assert!(err.to_string().contains("limit is 3"));
    }

    proptest! {
        #[test]
        fn normalized_tags_are_clean(tags in proptest::collection::vec("[ a-zA-Z]{0,6}", 0..8)) {
            let normalized = normalize_tags(&tags);
            for tag in &normalized {
                prop_assert!(!tag.is_empty());
                prop_assert_eq!(tag.trim(), tag.as_str());
                prop_assert_eq!(tag.to_lowercase(), tag.clone());
            }
            let mut deduped = normalized.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), normalized.len());
        }
    }
}
