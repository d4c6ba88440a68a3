//! Store contract between the aggregation pipeline and the warehouse.
//!
//! The pipeline only ever talks to this trait, so the real ClickHouse
//! store and the in-memory test store are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::metric::MetricDef;
use crate::rollup::DeltaRow;

/// Durable watermark + rollup storage for one warehouse.
///
/// All coordination between pipeline runs goes through this trait; the
/// engine keeps no mutable in-process aggregation state.
#[async_trait]
pub trait RollupStore: Send + Sync {
    /// Read the metric's last-processed event time.
    ///
    /// A metric with no watermark row reads as the epoch-zero sentinel.
    async fn load_watermark(&self, metric: &str) -> Result<DateTime<Utc>>;

    /// Scan raw events strictly newer than `watermark`, grouped by
    /// (page_url, event_date). Read-only; an empty result is normal.
    async fn fetch_delta(
        &self,
        metric: &MetricDef,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<DeltaRow>>;

    /// Apply the delta to the metric's rollup table: matching keys get
    /// their measures incremented, unseen keys are inserted. Atomic per
    /// call; a no-op for an empty delta.
    async fn merge_delta(&self, metric: &MetricDef, delta: &[DeltaRow]) -> Result<()>;

    /// Persist a new watermark for the metric. Implementations must never
    /// move the stored value backward, whatever candidate is given.
    async fn advance_watermark(&self, metric: &str, candidate: DateTime<Utc>) -> Result<()>;
}
