//! Infrastructure layer for external integrations.
//!
//! Concrete implementations of the collaborator traits defined in
//! [`crate::domain::repositories`].
//!
//! # Modules
//!
//! - [`storage`] - Quota-limited key-value stores (in-memory and JSON file)
//! - [`bookmarks`] - In-memory bookmark tree
//! - [`notify`] - Log-backed notifications

pub mod bookmarks;
pub mod notify;
pub mod storage;
