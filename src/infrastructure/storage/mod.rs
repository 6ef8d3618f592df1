//! Key-value store implementations.
//!
//! - [`MemoryStore`] - Process-local store (default, and for tests)
//! - [`FileStore`] - Single JSON document on disk

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::{DEFAULT_QUOTA_BYTES, MemoryStore};
