//! Internal metrics collection.
//!
//! Collects metrics in-memory and periodically flushes snapshots to the
//! warehouse's internal_metrics table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }
}

/// Collected metrics for the aggregation engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Pipeline outcomes
    pub pipeline_runs: Counter,
    pub pipeline_failures: Counter,
    pub pipeline_skips: Counter,
    pub empty_deltas: Counter,

    // Merge volume
    pub delta_rows_merged: Counter,
    pub watermark_advances: Counter,

    // Stage latencies
    pub delta_latency_ms: Histogram,
    pub merge_latency_ms: Histogram,
    pub pipeline_latency_ms: Histogram,

    // Flush bookkeeping
    pub metrics_flush_errors: Counter,

    // Gauges
    pub inflight_pipelines: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub pipeline_runs: u64,
    pub pipeline_failures: u64,
    pub pipeline_skips: u64,
    pub empty_deltas: u64,
    pub delta_rows_merged: u64,
    pub watermark_advances: u64,
    pub delta_latency_mean_ms: f64,
    pub merge_latency_mean_ms: f64,
    pub pipeline_latency_mean_ms: f64,
    pub inflight_pipelines: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            pipeline_runs: self.pipeline_runs.get(),
            pipeline_failures: self.pipeline_failures.get(),
            pipeline_skips: self.pipeline_skips.get(),
            empty_deltas: self.empty_deltas.get(),
            delta_rows_merged: self.delta_rows_merged.get(),
            watermark_advances: self.watermark_advances.get(),
            delta_latency_mean_ms: self.delta_latency_ms.mean(),
            merge_latency_mean_ms: self.merge_latency_ms.mean(),
            pipeline_latency_mean_ms: self.pipeline_latency_ms.mean(),
            inflight_pipelines: self.inflight_pipelines.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
