//! In-process statistics for a matching engine instance
//!
//! These complement the process-wide Prometheus metrics recorded through
//! [`observability::MatchingMetrics`]: each engine keeps its own counters so a
//! page context (or a test) can inspect exactly what happened to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Simple atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Latency accumulator (microseconds)
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    pub fn record(&self, value_us: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.min.fetch_min(value_us, Ordering::Relaxed);
        self.max.fetch_max(value_us, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> HistogramStats {
        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);

        HistogramStats {
            count,
            avg_us: if count > 0 { sum / count } else { 0 },
            min_us: if count > 0 { self.min.load(Ordering::Relaxed) } else { 0 },
            max_us: self.max.load(Ordering::Relaxed),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub avg_us: u64,
    pub min_us: u64,
    pub max_us: u64,
}

/// Per-engine match statistics
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Store round trips attempted
    pub queries_issued: Counter,
    /// Round trips that failed and degraded to no matches
    pub query_failures: Counter,
    /// Two-stage checks answered by the exact stage
    pub exact_hits: Counter,
    /// Two-stage checks that fell through to the make-only stage
    pub partial_fallbacks: Counter,
    /// Results dropped because the engine was disposed first
    pub results_discarded: Counter,
    pub query_latency: Histogram,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self, duration: Duration) {
        self.queries_issued.increment();
        self.query_latency.record(duration.as_micros() as u64);
    }

    pub fn record_failure(&self) {
        self.query_failures.increment();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let latency = self.query_latency.get_stats();

        StatsSnapshot {
            queries_issued: self.queries_issued.get(),
            query_failures: self.query_failures.get(),
            exact_hits: self.exact_hits.get(),
            partial_fallbacks: self.partial_fallbacks.get(),
            results_discarded: self.results_discarded.get(),
            query_latency_avg_us: latency.avg_us,
            query_latency_max_us: latency.max_us,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub queries_issued: u64,
    pub query_failures: u64,
    pub exact_hits: u64,
    pub partial_fallbacks: u64,
    pub results_discarded: u64,
    pub query_latency_avg_us: u64,
    pub query_latency_max_us: u64,
}
