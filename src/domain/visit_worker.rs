//! Background consumer of [`VisitEvent`]s.

use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::application::services::Engine;
use crate::domain::visit_event::VisitEvent;

/// Drains `rx` until every sender is dropped, handing each event to
/// [`Engine::handle_visit`].
///
/// Up to `concurrency` events are processed at once. Events for different
/// URLs interleave freely; events for the same URL are serialised inside the
/// engine. Returns after all in-flight events have finished.
pub async fn run_visit_worker(
    mut rx: mpsc::Receiver<VisitEvent>,
    engine: Arc<Engine>,
    concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    info!(concurrency, "Visit worker started");

    while let Some(event) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let engine = engine.clone();

        tasks.spawn(async move {
            let outcome = engine.handle_visit(&event).await;
            debug!(url = %event.url, outcome = ?outcome, "Visit processed");
            drop(permit);
        });

        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!(error = %e, "Visit task panicked");
            }
        }
    }

    while let Some(finished) = tasks.join_next().await {
        if let Err(e) = finished {
            error!(error = %e, "Visit task panicked");
        }
    }

    info!("Visit worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::EngineOptions;
    use crate::domain::repositories::BookmarkManager;
    use crate::infrastructure::bookmarks::InMemoryBookmarks;
    use crate::infrastructure::notify::LogNotifier;
    use crate::infrastructure::storage::MemoryStore;

    #[tokio::test]
    async fn test_worker_processes_all_events_before_exit() {
        let bookmarks = Arc::new(InMemoryBookmarks::new());
        let engine = Arc::new(
            Engine::bootstrap(
                Arc::new(MemoryStore::default()),
                bookmarks.clone(),
                Arc::new(LogNotifier),
                EngineOptions::default(),
            )
            .await
            .unwrap(),
        );
        let (tx, rx) = mpsc::channel(64);
        let worker = tokio::spawn(run_visit_worker(rx, engine.clone(), 4));

        for i in 0..10 {
            tx.send(VisitEvent::now(format!("https://site{i}.test/"), Some("Site")))
                .await
                .unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        assert_eq!(engine.store().record_count().await, 10);
        assert!(bookmarks.search_by_url("https://site0.test/").await.unwrap().is_empty());
    }
}
