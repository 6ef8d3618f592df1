//! Bookmark manager implementations.

pub mod memory_bookmarks;

pub use memory_bookmarks::InMemoryBookmarks;
