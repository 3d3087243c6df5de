//! Metrics collection for notifeed.
//!
//! Process-wide counters describing how the notification engine talks to
//! its event store and how much work grouping discards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Notification engine metrics collector.
#[derive(Debug)]
pub struct Metrics {
    // === Fetch Metrics ===
    /// Notification pages fetched successfully
    pub pages_fetched: AtomicU64,
    /// Notification page fetches that failed
    pub fetch_failures: AtomicU64,
    /// Total fetch latency in microseconds
    pub fetch_latency_us_total: AtomicU64,
    /// Fetch count for average calculation
    pub fetch_latency_count: AtomicU64,
    /// Fetch results discarded because a newer operation started
    pub fetches_superseded: AtomicU64,

    // === Grouping Metrics ===
    /// Raw notifications dropped as duplicates of an already held id
    pub duplicates_dropped: AtomicU64,
    /// Raw notifications dropped because their type is unknown
    pub unrecognized_dropped: AtomicU64,

    // === Seen Metrics ===
    /// Successful mark-seen calls
    pub mark_seen_succeeded: AtomicU64,
    /// Failed mark-seen calls
    pub mark_seen_failed: AtomicU64,

    // === Subject Post Metrics ===
    /// Subject post lookups answered from the session cache
    pub subject_cache_hits: AtomicU64,
    /// Subject post lookups that went to the event store
    pub subject_cache_misses: AtomicU64,
    /// Subject post resolutions that failed
    pub subject_resolve_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages_fetched: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            fetch_latency_us_total: AtomicU64::new(0),
            fetch_latency_count: AtomicU64::new(0),
            fetches_superseded: AtomicU64::new(0),

            duplicates_dropped: AtomicU64::new(0),
            unrecognized_dropped: AtomicU64::new(0),

            mark_seen_succeeded: AtomicU64::new(0),
            mark_seen_failed: AtomicU64::new(0),

            subject_cache_hits: AtomicU64::new(0),
            subject_cache_misses: AtomicU64::new(0),
            subject_resolve_failures: AtomicU64::new(0),
        }
    }

    /// Record a page fetch.
    pub fn record_fetch(&self, latency: Duration, success: bool) {
        if success {
            self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        }

        self.fetch_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.fetch_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fetch result that was discarded.
    pub fn record_superseded(&self) {
        self.fetches_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record notifications dropped as duplicates.
    pub fn record_duplicates(&self, count: u64) {
        if count > 0 {
            self.duplicates_dropped.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Record a notification dropped for an unknown type.
    pub fn record_unrecognized(&self) {
        self.unrecognized_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a mark-seen call.
    pub fn record_mark_seen(&self, success: bool) {
        if success {
            self.mark_seen_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.mark_seen_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a subject post cache hit/miss.
    pub fn record_subject_cache_access(&self, hit: bool) {
        if hit {
            self.subject_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.subject_cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed subject post resolution.
    pub fn record_subject_resolve_failure(&self) {
        self.subject_resolve_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            fetch_latency_avg_us: self.average_fetch_latency_us(),
            fetches_superseded: self.fetches_superseded.load(Ordering::Relaxed),

            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            unrecognized_dropped: self.unrecognized_dropped.load(Ordering::Relaxed),

            mark_seen_succeeded: self.mark_seen_succeeded.load(Ordering::Relaxed),
            mark_seen_failed: self.mark_seen_failed.load(Ordering::Relaxed),

            subject_cache_hit_rate: self.subject_cache_hit_rate(),
            subject_resolve_failures: self.subject_resolve_failures.load(Ordering::Relaxed),
        }
    }

    /// Calculate average fetch latency.
    fn average_fetch_latency_us(&self) -> u64 {
        let total = self.fetch_latency_us_total.load(Ordering::Relaxed);
        let count = self.fetch_latency_count.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    /// Calculate subject post cache hit rate.
    fn subject_cache_hit_rate(&self) -> f64 {
        let hits = self.subject_cache_hits.load(Ordering::Relaxed);
        let misses = self.subject_cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    // Fetch
    pub pages_fetched: u64,
    pub fetch_failures: u64,
    pub fetch_latency_avg_us: u64,
    pub fetches_superseded: u64,

    // Grouping
    pub duplicates_dropped: u64,
    pub unrecognized_dropped: u64,

    // Seen
    pub mark_seen_succeeded: u64,
    pub mark_seen_failed: u64,

    // Subject posts
    pub subject_cache_hit_rate: f64,
    pub subject_resolve_failures: u64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
