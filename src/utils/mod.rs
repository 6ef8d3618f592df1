//! Utility functions shared across layers.
//!
//! - [`tracking_url`] - URL canonicalisation and display helpers
//! - [`keyed_lock`] - Per-key async mutual exclusion

pub mod keyed_lock;
pub mod tracking_url;

pub use keyed_lock::{KeyedGuard, KeyedLock};
