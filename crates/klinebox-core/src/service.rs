//! Public query surface over the cache and the fetcher.
//!
//! Range queries run a fixed state machine:
//! `CHECK_CACHE → (HIT | MISS) → [FETCH → MERGE] → RETURN`. Point,
//! most-recent-N, and default-lookback queries are all expressed in terms of
//! the range query. A query that cannot be satisfied returns an empty or
//! absent result, never an error: downstream consumers treat "insufficient
//! data" as an ordinary outcome.

use time::{Date, OffsetDateTime};
use tracing::debug;

use crate::cache::{CacheStats, PeriodCache};
use crate::domain::{BarRecord, Period};
use crate::fetch::KlineFetcher;

/// Retrieval coordinator: serves bar queries from the cache, falling back to
/// the remote source on incomplete coverage.
///
/// Concurrent queries that both miss the same cell each fetch independently;
/// there is no in-flight deduplication. Merge idempotence makes the duplicate
/// work harmless.
#[derive(Clone)]
pub struct KlineService {
    cache: PeriodCache,
    fetcher: KlineFetcher,
}

impl KlineService {
    /// Build a service with its own empty cache.
    pub fn new(fetcher: KlineFetcher) -> Self {
        Self::with_cache(fetcher, PeriodCache::new())
    }

    /// Build a service over an injected cache store, so callers control the
    /// cache lifecycle and tests get isolated instances.
    pub fn with_cache(fetcher: KlineFetcher, cache: PeriodCache) -> Self {
        Self { cache, fetcher }
    }

    /// Bars for `[start, end]` inclusive, date descending; empty on no data.
    ///
    /// A cache window whose span covers the request is served without a
    /// remote call. On partial coverage the whole window is re-fetched, not
    /// just the missing delta, and merged back.
    pub async fn get_range(
        &self,
        code: &str,
        period: Period,
        start: Date,
        end: Date,
    ) -> Vec<BarRecord> {
        if start > end {
            // Unsatisfiable window; nothing cached or upstream can cover it.
            return Vec::new();
        }
        let cached = self.cache.range_filter(code, period, start, end).await;
        if !cached.is_empty() && self.cache.is_complete(code, period, start, end).await {
            debug!(code, period = %period, count = cached.len(), "cache hit");
            return cached;
        }

        debug!(code, period = %period, %start, %end, "cache miss, fetching full range");
        let fetched = self.fetcher.fetch(code, period, start, end).await;
        if fetched.is_empty() {
            // Total fetch failure or genuinely no data; cache left unchanged.
            return fetched;
        }

        self.cache.merge(code, period, &fetched).await;
        fetched
    }

    /// All available bars over the period's default lookback window ending
    /// today.
    pub async fn get_all(&self, code: &str, period: Period) -> Vec<BarRecord> {
        let end = today();
        let start = period.lookback_start(end);
        self.get_range(code, period, start, end).await
    }

    /// Bar at an exact date, if one exists.
    ///
    /// A cache miss widens to a `±search_radius` range query and scans the
    /// result for the exact calendar day.
    pub async fn get_at_date(&self, code: &str, period: Period, date: Date) -> Option<BarRecord> {
        if let Some(bar) = self.cache.lookup(code, period, date).await {
            return Some(bar);
        }

        let (start, end) = period.point_window(date);
        self.get_range(code, period, start, end)
            .await
            .into_iter()
            .find(|bar| bar.date == date)
    }

    /// The most recent `count` bars (or fewer if less are available).
    pub async fn get_recent(&self, code: &str, period: Period, count: usize) -> Vec<BarRecord> {
        let mut bars = self.get_all(code, period).await;
        bars.truncate(count);
        bars
    }

    /// Drop every cached entry.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    /// Drop all cached entries for one instrument.
    pub async fn invalidate_instrument(&self, code: &str) {
        self.cache.invalidate_instrument(code).await;
    }

    /// Drop one (instrument, period) cell.
    pub async fn invalidate_period(&self, code: &str, period: Period) {
        self.cache.invalidate_period(code, period).await;
    }

    /// Diagnostic cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
