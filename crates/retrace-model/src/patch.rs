//! Partial item updates

use crate::item::{Item, Priority};
use crate::validation::normalize_tags;
use serde::{Deserialize, Serialize};

/// Partial update of an item's mutable fields
///
/// `None` leaves a field untouched. The same type doubles as the undo
/// payload of an update: [`ItemPatch::previous_values`] captures exactly the
/// fields a patch is about to change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    /// New text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// New completion flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// New priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New tag set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ItemPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With text
    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// With completion flag
    #[inline]
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// With tags
    #[inline]
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// True if no field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.priority.is_none() && self.tags.is_none()
    }

    /// Trim text and normalize tags
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if let Some(text) = self.text.as_mut() {
            *text = text.trim().to_string();
        }
        if let Some(tags) = self.tags.as_mut() {
            *tags = normalize_tags(tags);
        }
        self
    }

    /// Names of the fields this patch sets
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(4);
        if self.text.is_some() {
            names.push("text");
        }
        if self.completed.is_some() {
            names.push("completed");
        }
        if self.priority.is_some() {
            names.push("priority");
        }
        if self.tags.is_some() {
            names.push("tags");
        }
        names
    }

    /// Apply to an item and bump its modification time
    pub fn apply(&self, item: &mut Item) {
        if let Some(text) = &self.text {
            item.text.clone_from(text);
        }
        if let Some(completed) = self.completed {
            item.completed = completed;
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        if let Some(tags) = &self.tags {
            item.tags.clone_from(tags);
        }
        item.touch();
    }

    /// Prior values, taken from `item`, of exactly the fields this patch sets
    #[must_use]
    pub fn previous_values(&self, item: &Item) -> ItemPatch {
        ItemPatch {
            text: self.text.as_ref().map(|_| item.text.clone()),
            completed: self.completed.map(|_| item.completed),
            priority: self.priority.map(|_| item.priority),
            tags: self.tags.as_ref().map(|_| item.tags.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn previous_values_only_cover_changed_fields() {
        let item = Item::new("t1", "old", 1).with_priority(Priority::Low);
        let patch = ItemPatch::new().with_text("new");

        let previous = patch.previous_values(&item);
        assert_eq!(previous, ItemPatch::new().with_text("old"));
    }

    #[test]
    fn apply_then_previous_restores_item() {
        let original = Item::new("t1", "old", 1).with_tags(["a"]);
        let patch = ItemPatch::new()
            .with_text("new")
            .with_completed(true)
            .with_tags(["b", "c"]);

        let previous = patch.previous_values(&original);
        let mut item = original.clone();
        patch.apply(&mut item);
        assert_eq!(item.text, "new");
        assert!(item.completed);

        previous.apply(&mut item);
        assert!(item.same_content(&original));
    }

    #[test]
    fn normalized_trims_and_lowercases() {
        let patch = ItemPatch::new().with_text("  hi ").with_tags([" A ", "a", " "]).normalized();
        assert_eq!(patch.text.as_deref(), Some("hi"));
        assert_eq!(patch.tags, Some(vec!["a".to_string()]));
    }

    #[test]
    fn field_names_and_emptiness() {
        assert!(ItemPatch::new().is_empty());
        let patch = ItemPatch::new().with_priority(Priority::High).with_completed(false);
        assert!(!patch.is_empty());
        assert_eq!(patch.field_names(), vec!["completed", "priority"]);
    }
}
