//! # Smart Bookmark
//!
//! Watches page visits, counts them per URL and calendar month, and promotes
//! a page to a classified bookmark once it has been visited often enough.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Visit records, settings, collaborator traits
//! - **Application Layer** ([`application`]) - Aggregation, promotion, retries, retention
//! - **Infrastructure Layer** ([`infrastructure`]) - Storage, bookmark tree, notifications
//! - **API Layer** ([`api`]) - REST API handlers, DTOs, and middleware
//!
//! ## Features
//!
//! - Capped daily visit counting (at most two visits per day count toward promotion)
//! - Daily exclude threshold for pages that are reloaded constantly
//! - Frequency-tier folders (`🔥 Daily`, `⭐ Regular`, `📅 Weekly`, `💡 New`)
//! - Durable retry queue for promotions that fail
//! - Month-bucketed retention with quota-pressure cleanup
//!
//! ## Quick Start
//!
//! ```bash
//! export STORAGE_PATH="./data/storage.json"   # Optional, in-memory otherwise
//! cargo run
//!
//! curl -X POST localhost:3000/api/visits \
//!   -H 'content-type: application/json' \
//!   -d '{"url":"https://example.com/","title":"Example"}'
//! ```
//!
//! ## Configuration
//!
//! Process configuration is loaded from environment variables via [`config::Config`].
//! User settings (threshold, exclusions, retention) live in storage and are
//! managed by [`application::services::SettingsService`].

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod scheduler;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::services::{Engine, EngineOptions, VisitOutcome};
    pub use crate::domain::entities::{Settings, VisitRecord};
    pub use crate::domain::visit_event::VisitEvent;
    pub use crate::error::AppError;
    pub use crate::state::AppState;
}
