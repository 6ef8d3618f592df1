//! Per-URL visit statistics inside a month bucket.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of distinct days kept in [`VisitRecord::daily_visits`].
pub const MAX_DAILY_ENTRIES: usize = 31;

/// Maximum contribution of a single day to [`VisitRecord::total_count`].
pub const DAILY_CONTRIBUTION_CAP: u32 = 2;

/// Visit statistics for one URL within one month bucket.
///
/// # Invariants
///
/// - `daily_visits` holds at most [`MAX_DAILY_ENTRIES`] dates; the oldest
///   dates are evicted first.
/// - `total_count` is the sum over days of `min(count, DAILY_CONTRIBUTION_CAP)`
///   and is recomputed on every mutation.
/// - `promoted` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub daily_visits: BTreeMap<NaiveDate, u32>,
    pub total_count: u32,
    pub title: String,
    pub promoted: bool,
    pub first_visit: NaiveDate,
}

impl VisitRecord {
    /// Creates an empty record first seen on `first_visit`.
    pub fn new(title: impl Into<String>, first_visit: NaiveDate) -> Self {
        Self {
            daily_visits: BTreeMap::new(),
            total_count: 0,
            title: title.into(),
            promoted: false,
            first_visit,
        }
    }

    /// Counts one visit on `day` and returns that day's visit count.
    ///
    /// Evicts history beyond [`MAX_DAILY_ENTRIES`] and recomputes the capped
    /// total before returning.
    pub fn record_visit(&mut self, day: NaiveDate) -> u32 {
        let count = {
            let entry = self.daily_visits.entry(day).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };

        self.evict_oldest();
        self.recompute_total();
        count
    }

    /// Drops the oldest days until at most [`MAX_DAILY_ENTRIES`] remain.
    ///
    /// Returns the number of evicted days.
    pub fn evict_oldest(&mut self) -> usize {
        let mut evicted = 0;
        while self.daily_visits.len() > MAX_DAILY_ENTRIES {
            self.daily_visits.pop_first();
            evicted += 1;
        }
        evicted
    }

    /// Recomputes and stores the capped total.
    pub fn recompute_total(&mut self) -> u32 {
        self.total_count = capped_total(&self.daily_visits);
        self.total_count
    }

    /// Marks the record promoted. Returns `true` only on the first transition.
    pub fn mark_promoted(&mut self) -> bool {
        let transitioned = !self.promoted;
        self.promoted = true;
        transitioned
    }

    /// Number of distinct days with at least one visit.
    pub fn visit_days(&self) -> usize {
        self.daily_visits.len()
    }
}

/// Sum of daily counts, each capped at [`DAILY_CONTRIBUTION_CAP`].
pub fn capped_total(daily_visits: &BTreeMap<NaiveDate, u32>) -> u32 {
    daily_visits
        .values()
        .map(|count| (*count).min(DAILY_CONTRIBUTION_CAP))
        .sum()
}
