//! Parameterized query construction for the delta computation.
//!
//! Query text carries only `?` placeholders; the watermark and event-name
//! values are bound by the store at execution time. Keeping the builder
//! pure makes the generated SQL testable without a live warehouse.

use engine_core::{AggregateKind, MetricDef};

/// Raw events table scanned by every delta query.
pub const EVENTS_TABLE: &str = "funnel.events";

/// Watermark table queried per metric.
pub const WATERMARKS_TABLE: &str = "funnel.watermarks";

/// SQL for reading a metric's watermark as DateTime64(3) milliseconds.
///
/// Aggregating over zero rows yields the epoch default, which doubles as
/// the never-processed sentinel. Binds: metric_name.
pub fn watermark_query() -> String {
    format!(
        "SELECT toUnixTimestamp64Milli(max(last_event_time)) FROM {WATERMARKS_TABLE} \
         WHERE metric_name = ?"
    )
}

/// Aggregate expression for a metric's primary measure.
fn aggregate_expr(kind: AggregateKind) -> &'static str {
    match kind {
        AggregateKind::CountEvents => "toFloat64(count())",
        AggregateKind::DistinctSessions => "toFloat64(uniqExact(session_id))",
        AggregateKind::SumOrderValue => "toFloat64(sum(coalesce(order_value, 0)))",
        AggregateKind::ScrollDepth => "toFloat64(sum(coalesce(percent_scroll, 0)))",
    }
}

/// Extra predicate excluding rows that cannot contribute to the measure.
fn anomaly_filter(kind: AggregateKind) -> Option<&'static str> {
    match kind {
        // A checkout row without an order value is a malformed event;
        // its contribution is dropped from the delta entirely.
        AggregateKind::SumOrderValue => Some("isNotNull(order_value)"),
        _ => None,
    }
}

/// SQL for one metric's delta: events strictly newer than the watermark,
/// grouped by (page_url, event_date).
///
/// Binds, in order: watermark milliseconds, then one value per entry in
/// the metric's event filter.
pub fn delta_query(metric: &MetricDef) -> String {
    let mut predicates = vec!["event_time > fromUnixTimestamp64Milli(?)".to_string()];

    if !metric.event_filter.is_empty() {
        let placeholders = vec!["?"; metric.event_filter.len()].join(", ");
        predicates.push(format!("event_name IN ({placeholders})"));
    }

    if let Some(filter) = anomaly_filter(metric.kind) {
        predicates.push(filter.to_string());
    }

    format!(
        "SELECT \
            page_url, \
            toDate(event_time) AS event_date, \
            {value} AS value, \
            toUInt64(count()) AS events, \
            toUnixTimestamp64Milli(max(event_time)) AS max_event_time \
         FROM {EVENTS_TABLE} \
         WHERE {filters} \
         GROUP BY page_url, event_date",
        value = aggregate_expr(metric.kind),
        filters = predicates.join(" AND "),
    )
}
