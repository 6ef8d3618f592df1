//! Page-visit event model for asynchronous visit tracking.

use chrono::{DateTime, Utc};

/// A page load reported by the event source.
///
/// Sent through a channel from the HTTP ingest handler to the background
/// worker, so the reporter never waits on aggregation or bookmark I/O.
///
/// # Usage Flow
///
/// 1. Created by the ingest handler (or any in-process observer)
/// 2. Sent to the visit channel (non-blocking)
/// 3. Processed by [`crate::domain::visit_worker::run_visit_worker`]
///
/// The event source gives no ordering or deduplication guarantees; rapid
/// reloads of the same page arrive as separate, possibly concurrent, events.
#[derive(Debug, Clone)]
pub struct VisitEvent {
    pub url: String,
    pub title: String,
    pub observed_at: DateTime<Utc>,
}

impl VisitEvent {
    /// Creates an event. An empty title is replaced by `"Untitled"`.
    pub fn new(url: impl Into<String>, title: Option<&str>, observed_at: DateTime<Utc>) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled");

        Self {
            url: url.into(),
            title: title.to_string(),
            observed_at,
        }
    }

    /// Creates an event observed now.
    pub fn now(url: impl Into<String>, title: Option<&str>) -> Self {
        Self::new(url, title, Utc::now())
    }
}
