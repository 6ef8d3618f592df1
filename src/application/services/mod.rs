//! Engine components.
//!
//! Leaf-first: [`PatternFilter`] and [`classifier`] are pure;
//! [`AggregateStore`] and [`RetryQueue`] own the mutable shared state;
//! [`VisitAggregator`], [`PromotionExecutor`], [`RetryQueueDrainer`] and
//! [`RetentionManager`] act on them; [`Engine`] wires everything together.

pub mod aggregate_store;
pub mod classifier;
pub mod engine;
pub mod pattern_filter;
pub mod promotion_executor;
pub mod retention_manager;
pub mod retry_drainer;
pub mod retry_queue;
pub mod settings_service;
pub mod stats_service;
pub mod visit_aggregator;

pub use aggregate_store::{AggregateStore, PruneReport};
pub use engine::{AlarmReport, Engine, EngineOptions, ResetReport, VisitOutcome};
pub use pattern_filter::PatternFilter;
pub use promotion_executor::{PromotionError, PromotionExecutor, PromotionOutcome, PromotionPolicy};
pub use retention_manager::{
    CleanupOutcome, CleanupTrigger, RetentionManager, StorageCheck, StorageUsage,
};
pub use retry_drainer::{DrainReport, RetryQueueDrainer};
pub use retry_queue::{RetryPolicy, RetryQueue};
pub use settings_service::SettingsService;
pub use stats_service::{MonthSummary, SiteSummary, StatsService};
pub use visit_aggregator::{IgnoreReason, PromotionDecision, VisitAggregator};
