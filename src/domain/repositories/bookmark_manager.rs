//! Bookmark manager consumed by the promotion executor.

use async_trait::async_trait;

use crate::domain::entities::{Bookmark, NewBookmark};

/// Errors raised by a [`BookmarkManager`].
#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    #[error("bookmark manager unavailable: {0}")]
    Unavailable(String),

    #[error("bookmark node not found: {0}")]
    NotFound(String),

    #[error("bookmark manager rejected the request: {0}")]
    Rejected(String),
}

impl BookmarkError {
    /// Whether an immediate retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Browser-style bookmark tree.
///
/// The engine does no deduplication of its own beyond looking a URL up
/// before creating it, so `search_by_url` must see every committed `create`.
///
/// # Implementations
///
/// - [`crate::infrastructure::bookmarks::InMemoryBookmarks`] - Process-local tree
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookmarkManager: Send + Sync {
    /// Bookmarks whose URL equals `url` exactly.
    async fn search_by_url(&self, url: &str) -> Result<Vec<Bookmark>, BookmarkError>;

    /// Bookmarks and folders whose title equals `title` exactly.
    async fn search_by_title(&self, title: &str) -> Result<Vec<Bookmark>, BookmarkError>;

    /// Root nodes with their full subtrees.
    async fn get_tree(&self) -> Result<Vec<Bookmark>, BookmarkError>;

    /// Creates a bookmark or folder under `new.parent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BookmarkError::NotFound`] if the parent does not exist.
    async fn create(&self, new: NewBookmark) -> Result<Bookmark, BookmarkError>;

    /// Direct children of a folder.
    async fn get_children(&self, folder_id: &str) -> Result<Vec<Bookmark>, BookmarkError>;
}
