//! Delta and watermark types shared between the pipeline and stores.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Epoch-zero sentinel for metrics that have never been processed.
pub fn epoch_watermark() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap()
}

/// One (page_url, event_date) group of freshly aggregated measures.
///
/// Ephemeral: produced by a single pipeline run, used as the merge source
/// and the watermark candidate, then discarded. The shape is the same for
/// every metric; the store maps `value`/`events` onto the metric's
/// measure columns at merge time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRow {
    pub page_url: String,
    pub event_date: NaiveDate,
    /// Primary measure: a count, a distinct count, or a sum.
    pub value: f64,
    /// Matching event count, carried for measures that pair a sum with
    /// its sample size (scroll depth).
    pub events: u64,
    /// Newest event observed in this group.
    pub max_event_time: DateTime<Utc>,
}

/// Watermark candidate for a just-computed delta.
///
/// `None` means the delta was empty and the watermark must stay put.
pub fn delta_high_water(delta: &[DeltaRow]) -> Option<DateTime<Utc>> {
    delta.iter().map(|row| row.max_event_time).max()
}
