//! Collaborator interfaces consumed by the engine.
//!
//! These traits abstract the external systems the engine talks to. Concrete
//! implementations live in [`crate::infrastructure`].
//!
//! # Available Interfaces
//!
//! - [`KeyValueStore`] - Durable JSON storage with a byte quota
//! - [`BookmarkManager`] - Bookmark tree lookup and creation
//! - [`Notifier`] - Fire-and-forget user notifications
//!
//! # Testing
//!
//! Mock implementations are generated via `mockall` under `cfg(test)`.

pub mod bookmark_manager;
pub mod kv_store;
pub mod notifier;

pub use bookmark_manager::{BookmarkError, BookmarkManager};
pub use kv_store::{KeyValueStore, StorageError};
pub use notifier::{Notifier, NotifyError};

#[cfg(test)]
pub use bookmark_manager::MockBookmarkManager;
#[cfg(test)]
pub use kv_store::MockKeyValueStore;
#[cfg(test)]
pub use notifier::MockNotifier;
