//! Per-metric aggregation pipeline.
//!
//! Stage order is load watermark → compute delta → merge → advance, and
//! the watermark only ever moves after the merge has committed. A crash
//! between merge and advance reprocesses an overlapping range on the
//! next tick; with additive rollup tables that window is bounded by the
//! watermark, so nothing is lost.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::debug;

use engine_core::{delta_high_water, DeltaRow, Error, MetricDef, Result, RollupStore};

/// Pipeline stage labels for logs and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Watermark read plus the grouped raw-event scan.
    Delta,
    /// Batch insert into the rollup table.
    Merge,
    /// Watermark write.
    Advance,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Merge => "merge",
            Self::Advance => "advance",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure, tagged with the stage that hit it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// Result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metric: &'static str,
    /// Number of (page, date) groups merged this run.
    pub delta_groups: usize,
    /// Watermark written this run; `None` when the delta was empty and
    /// the watermark was left untouched.
    pub advanced_to: Option<DateTime<Utc>>,
}

/// New watermark for a just-merged delta.
///
/// Empty deltas yield no candidate. A non-empty delta takes the max of
/// the delta's high-water mark and the current value, so event-time
/// clock skew can never move the watermark backward.
pub fn watermark_candidate(
    current: DateTime<Utc>,
    delta: &[DeltaRow],
) -> Option<DateTime<Utc>> {
    delta_high_water(delta).map(|high| high.max(current))
}

/// Runs the three-stage aggregation sequence for one metric.
pub struct MetricPipeline {
    store: Arc<dyn RollupStore>,
    metric: MetricDef,
    query_timeout: Duration,
}

impl MetricPipeline {
    pub fn new(store: Arc<dyn RollupStore>, metric: MetricDef, query_timeout: Duration) -> Self {
        Self {
            store,
            metric,
            query_timeout,
        }
    }

    pub fn metric(&self) -> &MetricDef {
        &self.metric
    }

    /// Execute one run: delta → merge → advance.
    ///
    /// Any failure leaves the watermark where it was; the next tick
    /// recomputes the same range.
    pub async fn run(&self) -> std::result::Result<RunOutcome, PipelineError> {
        let started = std::time::Instant::now();

        let watermark = self
            .stage(Stage::Delta, self.store.load_watermark(self.metric.name))
            .await?;

        let delta_started = std::time::Instant::now();
        let delta = self
            .stage(Stage::Delta, self.store.fetch_delta(&self.metric, watermark))
            .await?;
        metrics()
            .delta_latency_ms
            .observe(delta_started.elapsed().as_millis() as u64);

        if delta.is_empty() {
            metrics().empty_deltas.inc();
            debug!(
                metric = self.metric.name,
                watermark = %watermark,
                "No new events since watermark"
            );
            return Ok(RunOutcome {
                metric: self.metric.name,
                delta_groups: 0,
                advanced_to: None,
            });
        }

        self.stage(Stage::Merge, self.store.merge_delta(&self.metric, &delta))
            .await?;

        // Candidate exists because the delta is non-empty; still keep the
        // merge-then-advance order observable in the stage labels.
        let advanced_to = match watermark_candidate(watermark, &delta) {
            Some(candidate) => {
                self.stage(
                    Stage::Advance,
                    self.store.advance_watermark(self.metric.name, candidate),
                )
                .await?;
                Some(candidate)
            }
            None => None,
        };

        metrics()
            .pipeline_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        Ok(RunOutcome {
            metric: self.metric.name,
            delta_groups: delta.len(),
            advanced_to,
        })
    }

    /// Run one store operation under the per-query timeout, tagging
    /// failures with the stage label.
    async fn stage<T, F>(&self, stage: Stage, fut: F) -> std::result::Result<T, PipelineError>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(PipelineError { stage, source }),
            Err(_) => Err(PipelineError {
                stage,
                source: Error::Timeout(self.query_timeout.as_secs()),
            }),
        }
    }
}
