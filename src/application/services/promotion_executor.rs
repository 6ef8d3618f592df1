//! Turns a threshold crossing into a bookmark, exactly once per URL.

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, error, info, warn};

use crate::application::services::classifier::classify;
use crate::application::services::{AggregateStore, RetryQueue, SettingsService};
use crate::domain::entities::{
    Bookmark, NewBookmark, OrganizationType, PromotionRequest, RetryEntry, Tier,
};
use crate::domain::repositories::{BookmarkError, BookmarkManager, Notifier, StorageError};
use crate::utils::KeyedLock;
use crate::utils::tracking_url::display_host;

/// Title of the folder every promoted bookmark is filed under.
pub const ROOT_FOLDER_TITLE: &str = "Auto Bookmarks";

/// Title of the notification shown after a bookmark is created.
pub const NOTIFICATION_TITLE: &str = "Auto Bookmark Added";

/// Outcome of a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionOutcome {
    /// A bookmark for the URL already existed; none was created.
    AlreadyExists,
    Created,
    /// Every immediate attempt failed; the promotion waits in the retry queue.
    Queued,
}

impl PromotionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::Created => "created",
            Self::Queued => "queued",
        }
    }
}

/// Failure of a single promotion attempt.
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PromotionError {
    /// Whether an immediate retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Bookmark(e) => e.is_transient(),
            Self::Storage(e) => e.is_transient(),
        }
    }
}

/// Immediate-retry budget of [`PromotionExecutor::promote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionPolicy {
    /// Attempts before falling back to the retry queue. At least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Creates classified bookmarks for promoted URLs.
///
/// # Guarantees
///
/// - Idempotent: every attempt looks the URL up first and reports
///   [`PromotionOutcome::AlreadyExists`] instead of creating a duplicate.
/// - Attempts for one URL are serialised, so two racing promotions cannot
///   both pass the lookup.
/// - Folder creation is serialised and looked up by name first.
/// - [`PromotionExecutor::promote`] never fails; exhausted attempts end up in
///   the [`RetryQueue`].
pub struct PromotionExecutor {
    bookmarks: Arc<dyn BookmarkManager>,
    notifier: Arc<dyn Notifier>,
    store: Arc<AggregateStore>,
    retry_queue: Arc<RetryQueue>,
    settings: Arc<SettingsService>,
    policy: PromotionPolicy,
    promote_locks: KeyedLock,
    folder_lock: Mutex<()>,
}

impl PromotionExecutor {
    pub fn new(
        bookmarks: Arc<dyn BookmarkManager>,
        notifier: Arc<dyn Notifier>,
        store: Arc<AggregateStore>,
        retry_queue: Arc<RetryQueue>,
        settings: Arc<SettingsService>,
        policy: PromotionPolicy,
    ) -> Self {
        Self {
            bookmarks,
            notifier,
            store,
            retry_queue,
            settings,
            policy,
            promote_locks: KeyedLock::new(),
            folder_lock: Mutex::new(()),
        }
    }

    /// Promotes with immediate retries, queuing the request if they run out.
    ///
    /// Only transient failures are retried immediately; anything else goes
    /// straight to the queue.
    pub async fn promote(&self, request: PromotionRequest) -> PromotionOutcome {
        let attempts = AtomicU32::new(0);
        let retries = self.policy.max_attempts.saturating_sub(1) as usize;
        let strategy = FixedInterval::new(self.policy.retry_delay).take(retries);

        let result = RetryIf::start(
            strategy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(url = %request.url, attempt, "Promotion attempt");
                self.attempt(&request)
            },
            |e: &PromotionError| {
                warn!(url = %request.url, error = %e, "Promotion attempt failed");
                e.is_transient()
            },
        )
        .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let attempts = attempts.load(Ordering::Relaxed);
                self.defer(request, attempts, &e).await;
                PromotionOutcome::Queued
            }
        };

        counter!("promotions_total", "outcome" => outcome.as_str()).increment(1);
        outcome
    }

    /// One promotion attempt without retries.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError`] if the bookmark manager or storage fails.
    /// A bookmark created before a later step failed is found by the next
    /// attempt's lookup.
    pub async fn attempt(
        &self,
        request: &PromotionRequest,
    ) -> Result<PromotionOutcome, PromotionError> {
        let _guard = self.promote_locks.lock(&request.url).await;

        if !self.bookmarks.search_by_url(&request.url).await?.is_empty() {
            debug!(url = %request.url, "Bookmark already exists");
            self.mark_promoted(request).await?;
            return Ok(PromotionOutcome::AlreadyExists);
        }

        let tier = classify(request.record.total_count);
        let organization = self.settings.current().organization_type;
        let folder_id = self.destination_folder(tier, organization).await?;

        let bookmark = self
            .bookmarks
            .create(NewBookmark::link(folder_id, &request.title, &request.url))
            .await?;
        info!(
            url = %request.url,
            bookmark_id = %bookmark.id,
            tier = ?tier,
            visits = request.record.total_count,
            "Bookmark created"
        );

        self.mark_promoted(request).await?;
        self.notify_created(request).await;

        Ok(PromotionOutcome::Created)
    }

    /// Returns the id of the "Auto Bookmarks" folder, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BookmarkError`] if the tree cannot be read or written.
    pub async fn ensure_root_folder(&self) -> Result<String, BookmarkError> {
        let _guard = self.folder_lock.lock().await;
        self.root_folder().await
    }

    async fn destination_folder(
        &self,
        tier: Tier,
        organization: OrganizationType,
    ) -> Result<String, BookmarkError> {
        let _guard = self.folder_lock.lock().await;
        let root_id = self.root_folder().await?;

        if organization == OrganizationType::Flat {
            return Ok(root_id);
        }

        let name = tier.folder_name();
        let existing = self
            .bookmarks
            .get_children(&root_id)
            .await?
            .into_iter()
            .find(|child| child.is_folder() && child.title == name);
        if let Some(folder) = existing {
            return Ok(folder.id);
        }

        let folder = self.bookmarks.create(NewBookmark::folder(&root_id, name)).await?;
        info!(folder = name, id = %folder.id, "Created tier folder");
        Ok(folder.id)
    }

    /// Caller must hold `folder_lock`.
    async fn root_folder(&self) -> Result<String, BookmarkError> {
        let existing = self
            .bookmarks
            .search_by_title(ROOT_FOLDER_TITLE)
            .await?
            .into_iter()
            .find(Bookmark::is_folder);
        if let Some(folder) = existing {
            return Ok(folder.id);
        }

        let tree = self.bookmarks.get_tree().await?;
        let parent_id = tree
            .first()
            .and_then(|root| root.children.first())
            .map(|node| node.id.clone())
            .ok_or_else(|| {
                BookmarkError::NotFound("bookmark tree has no top-level folder".to_string())
            })?;

        let folder = self
            .bookmarks
            .create(NewBookmark::folder(parent_id, ROOT_FOLDER_TITLE))
            .await?;
        info!(id = %folder.id, "Created auto-bookmark folder");
        Ok(folder.id)
    }

    async fn mark_promoted(&self, request: &PromotionRequest) -> Result<(), StorageError> {
        let flagged = self.store.mark_promoted(request.month, &request.url).await?;
        if !flagged {
            debug!(
                url = %request.url,
                month = %request.month,
                "Visit record gone before promotion was recorded"
            );
        }
        Ok(())
    }

    async fn notify_created(&self, request: &PromotionRequest) {
        let id = format!("bookmark-{}", Utc::now().timestamp_millis());
        let message = format!(
            "{} ({} visits)\n\"{}\"",
            display_host(&request.url),
            request.record.total_count,
            request.title
        );

        if let Err(e) = self.notifier.notify(&id, NOTIFICATION_TITLE, &message).await {
            warn!(url = %request.url, error = %e, "Notification failed");
        }
    }

    async fn defer(&self, request: PromotionRequest, attempts: u32, cause: &PromotionError) {
        let url = request.url.clone();
        let entry = RetryEntry::new(request, Utc::now(), attempts);

        match self.retry_queue.enqueue(entry).await {
            Ok(outcome) => {
                warn!(
                    url = %url,
                    attempts,
                    error = %cause,
                    outcome = ?outcome,
                    "Promotion deferred to retry queue"
                );
            }
            Err(e) => {
                error!(
                    url = %url,
                    attempts,
                    error = %e,
                    "Failed to queue promotion, it will be retried on the next qualifying visit"
                );
            }
        }
    }
}
