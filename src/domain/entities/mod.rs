//! Core domain entities.
//!
//! Entities are plain data structures; the rules that mutate them live in
//! [`crate::application::services`].
//!
//! # Entity Types
//!
//! - [`Settings`] - User tracking settings
//! - [`ExclusionEntry`] - URL exclusion rule
//! - [`VisitRecord`] - Per-URL statistics inside a month bucket
//! - [`RetryEntry`] / [`PromotionRequest`] - Deferred promotion work
//! - [`Bookmark`] / [`NewBookmark`] - Bookmark tree nodes
//! - [`Tier`] - Frequency classification

pub mod bookmark;
pub mod exclusion;
pub mod retry_entry;
pub mod settings;
pub mod tier;
pub mod visit_record;

pub use bookmark::{Bookmark, NewBookmark};
pub use exclusion::{ExclusionEntry, default_exclusions};
pub use retry_entry::{PromotionRequest, RetryEntry};
pub use settings::{OrganizationType, Settings};
pub use tier::Tier;
pub use visit_record::{DAILY_CONTRIBUTION_CAP, MAX_DAILY_ENTRIES, VisitRecord};
