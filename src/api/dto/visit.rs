//! DTOs for the visit ingest endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::VisitOutcome;
use crate::domain::visit_event::VisitEvent;

/// A completed page load reported by the event source.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    #[validate(url(message = "Invalid URL format"), length(max = 8192))]
    pub url: String,

    /// Page title; blank or missing titles are stored as "Untitled".
    #[validate(length(max = 1024))]
    pub title: Option<String>,

    /// When the page finished loading. Defaults to the time of receipt.
    pub observed_at: Option<DateTime<Utc>>,
}

impl VisitRequest {
    pub fn into_event(self) -> VisitEvent {
        let observed_at = self.observed_at.unwrap_or_else(Utc::now);
        VisitEvent::new(self.url, self.title.as_deref(), observed_at)
    }
}

/// Query parameters of `POST /api/visits`.
#[derive(Debug, Default, Deserialize)]
pub struct VisitQuery {
    /// Process the visit before responding instead of queueing it.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    /// `queued` or `processed`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VisitOutcome>,
}

impl VisitResponse {
    pub fn queued() -> Self {
        Self {
            status: "queued",
            outcome: None,
        }
    }

    pub fn processed(outcome: VisitOutcome) -> Self {
        Self {
            status: "processed",
            outcome: Some(outcome),
        }
    }
}
