//! Domain layer containing the engine's data model and collaborator contracts.
//!
//! # Architecture
//!
//! - [`entities`] - Visit records, settings, bookmarks and retry entries
//! - [`repositories`] - Storage, bookmark and notification trait definitions
//! - [`time_bucket`] - Month bucket keys and calendar-day keys
//! - [`visit_event`] - Page-visit event model
//! - [`visit_worker`] - Asynchronous visit processing worker
//! - [`alarm`] - Named periodic maintenance jobs
//!
//! # Visit Processing Flow
//!
//! 1. The ingest handler receives a page visit
//! 2. [`visit_event::VisitEvent`] is sent to an async channel
//! 3. [`visit_worker::run_visit_worker`] hands it to the engine
//! 4. The engine counts it and, when due, promotes the URL to a bookmark

pub mod alarm;
pub mod entities;
pub mod repositories;
pub mod time_bucket;
pub mod visit_event;
pub mod visit_worker;
