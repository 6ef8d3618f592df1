#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use smart_bookmark::application::services::{Engine, EngineOptions, PromotionPolicy};
use smart_bookmark::domain::entities::{Bookmark, ExclusionEntry, NewBookmark, Settings};
use smart_bookmark::domain::repositories::{BookmarkError, BookmarkManager};
use smart_bookmark::domain::visit_event::VisitEvent;
use smart_bookmark::infrastructure::bookmarks::InMemoryBookmarks;
use smart_bookmark::infrastructure::notify::LogNotifier;
use smart_bookmark::infrastructure::storage::MemoryStore;
use smart_bookmark::state::AppState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Bookmark tree that can be switched offline.
pub struct FlakyBookmarks {
    pub inner: InMemoryBookmarks,
    offline: AtomicBool,
}

impl FlakyBookmarks {
    pub fn new() -> Self {
        Self {
            inner: InMemoryBookmarks::new(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BookmarkError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BookmarkError::Unavailable("bookmark service offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BookmarkManager for FlakyBookmarks {
    async fn search_by_url(&self, url: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        self.check()?;
        self.inner.search_by_url(url).await
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        self.check()?;
        self.inner.search_by_title(title).await
    }

    async fn get_tree(&self) -> Result<Vec<Bookmark>, BookmarkError> {
        self.check()?;
        self.inner.get_tree().await
    }

    async fn create(&self, new: NewBookmark) -> Result<Bookmark, BookmarkError> {
        self.check()?;
        self.inner.create(new).await
    }

    async fn get_children(&self, folder_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        self.check()?;
        self.inner.get_children(folder_id).await
    }
}

/// Engine options with near-instant immediate retries.
pub fn fast_options() -> EngineOptions {
    EngineOptions {
        promotion: PromotionPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
        },
        ..EngineOptions::default()
    }
}

pub async fn create_engine(
    storage: Arc<MemoryStore>,
    bookmarks: Arc<dyn BookmarkManager>,
    options: EngineOptions,
) -> Arc<Engine> {
    Arc::new(
        Engine::bootstrap(storage, bookmarks, Arc::new(LogNotifier), options)
            .await
            .unwrap(),
    )
}

/// Fresh engine over in-memory collaborators.
pub async fn create_test_engine() -> (Arc<Engine>, Arc<InMemoryBookmarks>) {
    let bookmarks = Arc::new(InMemoryBookmarks::new());
    let engine = create_engine(
        Arc::new(MemoryStore::default()),
        bookmarks.clone(),
        fast_options(),
    )
    .await;
    (engine, bookmarks)
}

pub async fn apply_settings(engine: &Engine, settings: Settings, exclusions: Vec<ExclusionEntry>) {
    engine.settings().save(settings, exclusions).await.unwrap();
}

pub fn create_test_state(engine: Arc<Engine>) -> (AppState, mpsc::Receiver<VisitEvent>) {
    let (tx, rx) = mpsc::channel(100);
    (AppState::new(engine, tx), rx)
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn visit(url: &str, observed_at: DateTime<Utc>) -> VisitEvent {
    VisitEvent::new(url, Some("Test Page"), observed_at)
}
