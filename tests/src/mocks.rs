//! In-memory rollup store for behavioral tests.
//!
//! `MemoryStore` implements the same `RollupStore` trait as the real
//! ClickHouse store, mirroring its semantics: grouped delta scans over an
//! append-only event vector, additive merges into per-table maps, and a
//! never-backward watermark map. Tests can inject failures per metric
//! and op, and delay delta scans to exercise run serialization.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use engine_core::{
    epoch_watermark, AggregateKind, DeltaRow, Error, MetricDef, RawEvent, Result, RollupStore,
};

/// Which store operation an injected failure should hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    FetchDelta,
    MergeDelta,
    AdvanceWatermark,
}

/// Accumulated measures for one (page_url, event_date) rollup key.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasureCell {
    pub value: f64,
    pub events: u64,
}

#[derive(Default)]
struct Inner {
    events: Vec<RawEvent>,
    rollups: HashMap<&'static str, HashMap<(String, NaiveDate), MeasureCell>>,
    watermarks: HashMap<String, DateTime<Utc>>,
    failures: HashMap<String, FailurePoint>,
    merge_calls: HashMap<String, u64>,
}

/// In-memory stand-in for the warehouse.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    delta_delay: Mutex<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: RawEvent) {
        self.inner.lock().events.push(event);
    }

    pub fn push_events(&self, events: impl IntoIterator<Item = RawEvent>) {
        self.inner.lock().events.extend(events);
    }

    /// Measures stored for one rollup key, if any.
    pub fn rollup_cell(&self, table: &str, page: &str, date: NaiveDate) -> Option<MeasureCell> {
        self.inner
            .lock()
            .rollups
            .get(table)?
            .get(&(page.to_string(), date))
            .copied()
    }

    /// Number of keys in one rollup table.
    pub fn rollup_len(&self, table: &str) -> usize {
        self.inner
            .lock()
            .rollups
            .get(table)
            .map_or(0, |t| t.len())
    }

    /// Stored watermark for a metric, if ever advanced.
    pub fn watermark(&self, metric: &str) -> Option<DateTime<Utc>> {
        self.inner.lock().watermarks.get(metric).copied()
    }

    /// Inject a failure for one metric's store operation.
    pub fn fail_at(&self, metric: &str, point: FailurePoint) {
        self.inner
            .lock()
            .failures
            .insert(metric.to_string(), point);
    }

    /// Clear an injected failure.
    pub fn clear_failure(&self, metric: &str) {
        self.inner.lock().failures.remove(metric);
    }

    /// Delay every delta scan, to hold pipelines in flight.
    pub fn set_delta_delay(&self, delay: Duration) {
        *self.delta_delay.lock() = delay;
    }

    /// How many times merge_delta ran for a metric.
    pub fn merge_calls(&self, metric: &str) -> u64 {
        self.inner
            .lock()
            .merge_calls
            .get(metric)
            .copied()
            .unwrap_or(0)
    }

    fn check_failure(&self, metric: &str, point: FailurePoint) -> Result<()> {
        if self.inner.lock().failures.get(metric) == Some(&point) {
            return Err(Error::store(format!(
                "injected {point:?} failure for {metric}"
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
struct GroupAcc {
    value: f64,
    sessions: HashSet<String>,
    events: u64,
    max_event_time: Option<DateTime<Utc>>,
}

#[async_trait]
impl RollupStore for MemoryStore {
    async fn load_watermark(&self, metric: &str) -> Result<DateTime<Utc>> {
        Ok(self
            .inner
            .lock()
            .watermarks
            .get(metric)
            .copied()
            .unwrap_or_else(epoch_watermark))
    }

    async fn fetch_delta(
        &self,
        metric: &MetricDef,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<DeltaRow>> {
        let delay = *self.delta_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.check_failure(metric.name, FailurePoint::FetchDelta)?;

        let events: Vec<RawEvent> = self
            .inner
            .lock()
            .events
            .iter()
            .filter(|e| e.event_time > watermark && metric.matches(e.event_name))
            .cloned()
            .collect();

        let mut groups: BTreeMap<(String, NaiveDate), GroupAcc> = BTreeMap::new();

        for event in events {
            // Rows that cannot contribute to the measure are excluded,
            // matching the warehouse query's anomaly filter.
            if metric.kind == AggregateKind::SumOrderValue && event.order_value.is_none() {
                continue;
            }

            let key = (event.page_url.clone(), event.event_time.date_naive());
            let acc = groups.entry(key).or_default();

            acc.events += 1;
            acc.max_event_time = Some(match acc.max_event_time {
                Some(t) => t.max(event.event_time),
                None => event.event_time,
            });

            match metric.kind {
                AggregateKind::CountEvents => acc.value += 1.0,
                AggregateKind::DistinctSessions => {
                    acc.sessions.insert(event.session_id.clone());
                }
                AggregateKind::SumOrderValue => {
                    acc.value += event.order_value.unwrap_or(0.0);
                }
                AggregateKind::ScrollDepth => {
                    acc.value += event.percent_scroll.unwrap_or(0.0);
                }
            }
        }

        Ok(groups
            .into_iter()
            .filter_map(|((page_url, event_date), acc)| {
                let max_event_time = acc.max_event_time?;
                let value = if metric.kind == AggregateKind::DistinctSessions {
                    acc.sessions.len() as f64
                } else {
                    acc.value
                };
                Some(DeltaRow {
                    page_url,
                    event_date,
                    value,
                    events: acc.events,
                    max_event_time,
                })
            })
            .collect())
    }

    async fn merge_delta(&self, metric: &MetricDef, delta: &[DeltaRow]) -> Result<()> {
        self.check_failure(metric.name, FailurePoint::MergeDelta)?;

        let mut inner = self.inner.lock();
        *inner
            .merge_calls
            .entry(metric.name.to_string())
            .or_insert(0) += 1;

        if delta.is_empty() {
            return Ok(());
        }

        let table = inner.rollups.entry(metric.rollup_table).or_default();
        for row in delta {
            let cell = table
                .entry((row.page_url.clone(), row.event_date))
                .or_default();
            cell.value += row.value;
            cell.events += row.events;
        }

        Ok(())
    }

    async fn advance_watermark(&self, metric: &str, candidate: DateTime<Utc>) -> Result<()> {
        self.check_failure(metric, FailurePoint::AdvanceWatermark)?;

        let mut inner = self.inner.lock();
        let entry = inner
            .watermarks
            .entry(metric.to_string())
            .or_insert(candidate);
        // Same invariant as the warehouse table: never move backward.
        *entry = (*entry).max(candidate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_watermark_never_regresses() {
        let store = MemoryStore::new();
        let newer = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();

        store.advance_watermark("sessions", newer).await.unwrap();
        store.advance_watermark("sessions", older).await.unwrap();

        assert_eq!(store.watermark("sessions"), Some(newer));
    }

    #[tokio::test]
    async fn test_unset_watermark_reads_as_epoch() {
        let store = MemoryStore::new();
        let wm = store.load_watermark("total_revenue").await.unwrap();
        assert_eq!(wm.timestamp(), 0);
    }
}
