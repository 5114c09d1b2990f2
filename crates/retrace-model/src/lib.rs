//! Retrace Model
//!
//! Plain data shared by every layer of the engine:
//! - [`Item`]: a confirmed list entry
//! - [`NewItem`] / [`ItemPatch`]: creation and partial-update requests
//! - [`PendingItem`]: an optimistic entry awaiting remote confirmation
//! - [`ItemSource`]: read access to a keyed item collection
//!
//! # Example
//!
//! ```rust
//! use retrace_model::{Item, ItemPatch, NewItem, Priority};
//!
//! let mut item = Item::from_request(NewItem::new("  Buy milk ").with_tag(" Errands "), 1024);
//! assert_eq!(item.text, "Buy milk");
//! assert_eq!(item.tags, vec!["errands".to_string()]);
//!
//! let patch = ItemPatch::new().with_priority(Priority::High);
//! let previous = patch.previous_values(&item);
//! patch.apply(&mut item);
//! assert_eq!(previous.priority, Some(Priority::Medium));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod item;
mod patch;
mod pending;
mod source;
mod validation;

pub use item::{Item, ItemId, NewItem, Priority};
pub use patch::ItemPatch;
pub use pending::{PendingChange, PendingItem};
pub use source::ItemSource;
pub use validation::{normalize_tags, validate_text, ValidationError, DEFAULT_MAX_TEXT_LEN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
