//! Shared application state injected into every handler.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::services::Engine;
use crate::domain::visit_event::VisitEvent;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Ingest side of the visit channel consumed by
    /// [`crate::domain::visit_worker::run_visit_worker`].
    pub visit_tx: mpsc::Sender<VisitEvent>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, visit_tx: mpsc::Sender<VisitEvent>) -> Self {
        Self { engine, visit_tx }
    }
}
