//! Per-month visit summaries.

use serde::Serialize;
use std::sync::Arc;

use crate::application::services::AggregateStore;
use crate::domain::time_bucket::MonthKey;

/// Number of sites listed in [`MonthSummary::top_sites`].
pub const TOP_SITES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    pub url: String,
    pub title: String,
    pub total_count: u32,
    pub promoted: bool,
}

/// Overview of one month bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: MonthKey,
    pub tracked_sites: usize,
    pub promoted_sites: usize,
    /// Most visited sites, highest capped total first.
    pub top_sites: Vec<SiteSummary>,
}

/// Read-only statistics over the [`AggregateStore`].
pub struct StatsService {
    store: Arc<AggregateStore>,
}

impl StatsService {
    pub fn new(store: Arc<AggregateStore>) -> Self {
        Self { store }
    }

    /// Summary of `month`. An unknown month yields an empty summary.
    pub async fn month_summary(&self, month: MonthKey) -> MonthSummary {
        let records = self.store.snapshot_month(month).await;

        let tracked_sites = records.len();
        let promoted_sites = records.iter().filter(|(_, r)| r.promoted).count();

        let mut sites: Vec<SiteSummary> = records
            .into_iter()
            .map(|(url, record)| SiteSummary {
                url,
                title: record.title,
                total_count: record.total_count,
                promoted: record.promoted,
            })
            .collect();
        sites.sort_by(|a, b| b.total_count.cmp(&a.total_count).then_with(|| a.url.cmp(&b.url)));
        sites.truncate(TOP_SITES);

        MonthSummary {
            month,
            tracked_sites,
            promoted_sites,
            top_sites: sites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::VisitRecord;
    use crate::infrastructure::storage::MemoryStore;
    use chrono::{Duration, NaiveDate};

    #[tokio::test]
    async fn test_month_summary_counts_and_orders_top_sites() {
        let store = Arc::new(AggregateStore::new(Arc::new(MemoryStore::default())));
        let first = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let month = MonthKey::from_date(first);

        for (i, days) in [1u32, 7, 3, 9, 2, 5, 4].iter().enumerate() {
            let url = format!("https://site{i}.test/");
            store
                .upsert(month, &url, || VisitRecord::new(format!("Site {i}"), first), |r| {
                    for d in 0..*days {
                        r.record_visit(first + Duration::days(d as i64));
                    }
                    if *days > 6 {
                        r.mark_promoted();
                    }
                })
                .await
                .unwrap();
        }

        let summary = StatsService::new(store).month_summary(month).await;

        assert_eq!(summary.tracked_sites, 7);
        assert_eq!(summary.promoted_sites, 2);
        let totals: Vec<u32> = summary.top_sites.iter().map(|s| s.total_count).collect();
        assert_eq!(totals, vec![9, 7, 5, 4, 3]);
        assert_eq!(summary.top_sites[0].url, "https://site3.test/");
    }

    #[tokio::test]
    async fn test_unknown_month_is_empty() {
        let store = Arc::new(AggregateStore::new(Arc::new(MemoryStore::default())));

        let summary = StatsService::new(store)
            .month_summary(MonthKey::new(2030, 1).unwrap())
            .await;

        assert_eq!(summary.tracked_sites, 0);
        assert!(summary.top_sites.is_empty());
    }
}
