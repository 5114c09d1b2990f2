//! Item identity and the confirmed item record

use crate::validation::normalize_tags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Opaque, immutable item identifier
///
/// Client-generated ids are UUID v4 strings; a remote service may assign its
/// own ids on creation, so no format is assumed when comparing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh client-side id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Item priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority
    Low,
    /// Medium priority (default)
    #[default]
    Medium,
    /// High priority
    High,
}

impl Priority {
    /// Lowercase label used in descriptions and wire formats
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// A confirmed list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Identifier (never changes after creation)
    pub id: ItemId,
    /// Display text
    pub text: String,
    /// Completion flag
    pub completed: bool,
    /// Priority
    pub priority: Priority,
    /// Position value; need not be contiguous
    pub order: i64,
    /// Normalized tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create an item with default priority and no tags
    #[must_use]
    pub fn new(id: impl Into<ItemId>, text: impl Into<String>, order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            priority: Priority::default(),
            order,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a candidate item from a creation request
    ///
    /// The id is generated client-side; the remote may replace it.
    #[must_use]
    pub fn from_request(request: NewItem, order: i64) -> Self {
        let mut item = Self::new(ItemId::generate(), request.text.trim(), order);
        item.priority = request.priority.unwrap_or_default();
        item.tags = normalize_tags(&request.tags);
        item
    }

    /// With completion flag
    #[inline]
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// With tags (normalized)
    #[inline]
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = normalize_tags(&raw);
        self
    }

    /// Bump the modification time
    #[inline]
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Total display ordering: by order value, then by id
    #[inline]
    #[must_use]
    pub fn cmp_position(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Compare everything except timestamps
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.text == other.text
            && self.completed == other.completed
            && self.priority == other.priority
            && self.order == other.order
            && self.tags == other.tags
    }
}

/// Creation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    /// Display text (trimmed on creation)
    pub text: String,
    /// Priority; `Medium` when absent
    pub priority: Option<Priority>,
    /// Raw tags (normalized on creation)
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewItem {
    /// Create a request with text only
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: None,
            tags: Vec::new(),
        }
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// With an extra tag
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
