//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod alarms;
pub mod health;
pub mod settings;
pub mod stats;
pub mod visits;

pub use alarms::{alarm_handler, cleanup_handler};
pub use health::health_handler;
pub use settings::{reload_settings_handler, settings_handler};
pub use stats::stats_handler;
pub use visits::record_visit_handler;
