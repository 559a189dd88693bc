//! In-memory multi-period bar cache.
//!
//! Three-level store: instrument code → period → (date → [`BarRecord`]).
//! The cache exclusively owns its records; queries hand out clones. There is
//! no eviction: cells only grow until explicitly invalidated, and unbounded
//! growth is the caller's responsibility.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use time::Date;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{BarRecord, Period};

type Cell = BTreeMap<Date, BarRecord>;

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<String, HashMap<Period, Cell>>,
}

impl CacheInner {
    fn cell(&self, code: &str, period: Period) -> Option<&Cell> {
        self.map.get(code).and_then(|periods| periods.get(&period))
    }
}

/// Diagnostic snapshot of cache contents, computed by full scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub instruments: usize,
    pub bars: usize,
    pub by_period: HashMap<String, usize>,
}

/// Thread-safe layered cache of price bars.
///
/// Cloning is cheap and shares the underlying store; construct separate
/// instances for isolated tests. Every write keys a record by its own `date`
/// field, so the date key always equals the stored record's date.
#[derive(Debug, Clone, Default)]
pub struct PeriodCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl PeriodCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact point lookup.
    pub async fn lookup(&self, code: &str, period: Period, date: Date) -> Option<BarRecord> {
        let store = self.inner.read().await;
        store
            .cell(code, period)
            .and_then(|cell| cell.get(&date))
            .cloned()
    }

    /// All stored bars for the cell whose date lies in `[start, end]`
    /// inclusive, sorted by date descending.
    ///
    /// A reversed window (`start > end`) is unsatisfiable and yields an empty
    /// result.
    pub async fn range_filter(
        &self,
        code: &str,
        period: Period,
        start: Date,
        end: Date,
    ) -> Vec<BarRecord> {
        if start > end {
            return Vec::new();
        }
        let store = self.inner.read().await;
        let Some(cell) = store.cell(code, period) else {
            return Vec::new();
        };
        cell.range(start..=end).rev().map(|(_, bar)| bar.clone()).collect()
    }

    /// Boundary-coverage completeness test: true iff the cell is non-empty
    /// and its stored span `[min, max]` covers `[start, end]`.
    ///
    /// Gaps strictly inside the span are not detected; a cell holding only
    /// the two boundary dates still counts as complete.
    pub async fn is_complete(&self, code: &str, period: Period, start: Date, end: Date) -> bool {
        if start > end {
            return false;
        }
        let store = self.inner.read().await;
        let Some(cell) = store.cell(code, period) else {
            return false;
        };
        match (cell.keys().next(), cell.keys().next_back()) {
            (Some(&earliest), Some(&latest)) => earliest <= start && latest >= end,
            _ => false,
        }
    }

    /// Merge bars into a cell, keying each record by its own date.
    ///
    /// Existing entries at the same date are overwritten whole; entries
    /// outside the supplied set are never removed. Merging the same bars
    /// twice is a no-op the second time.
    pub async fn merge(&self, code: &str, period: Period, bars: &[BarRecord]) {
        if bars.is_empty() {
            return;
        }
        let mut store = self.inner.write().await;
        let cell = store
            .map
            .entry(code.to_owned())
            .or_default()
            .entry(period)
            .or_default();
        for bar in bars {
            debug_assert_eq!(bar.period, period, "bar period must match the cell");
            cell.insert(bar.date, bar.clone());
        }
        debug!(code, period = %period, merged = bars.len(), total = cell.len(), "cache cell updated");
    }

    /// Remove every entry.
    pub async fn invalidate(&self) {
        let mut store = self.inner.write().await;
        store.map.clear();
    }

    /// Remove all entries for one instrument.
    pub async fn invalidate_instrument(&self, code: &str) {
        let mut store = self.inner.write().await;
        store.map.remove(code);
    }

    /// Remove one (instrument, period) cell.
    pub async fn invalidate_period(&self, code: &str, period: Period) {
        let mut store = self.inner.write().await;
        if let Some(periods) = store.map.get_mut(code) {
            periods.remove(&period);
        }
    }

    /// Instrument count, total bar count, and a per-period breakdown.
    ///
    /// Full scan at call time; diagnostic only, not a hot path.
    pub async fn stats(&self) -> CacheStats {
        let store = self.inner.read().await;
        let mut bars = 0;
        let mut by_period: HashMap<String, usize> = HashMap::new();
        for periods in store.map.values() {
            for (period, cell) in periods {
                bars += cell.len();
                *by_period.entry(period.as_str().to_owned()).or_default() += cell.len();
            }
        }
        CacheStats {
            instruments: store.map.len(),
            bars,
            by_period,
        }
    }
}
