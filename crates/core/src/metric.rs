//! Metric definitions driving the aggregation pipelines.
//!
//! Each metric names a watermark row, an event filter, an aggregate
//! expression, and a rollup table keyed by (page_url, event_date).

use serde::{Deserialize, Serialize};

use crate::events::EventName;

/// How raw events collapse into a delta group's measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    /// count() of matching events.
    CountEvents,
    /// count(distinct session_id) within the delta window.
    ///
    /// Distinct counts are computed per window and merged additively, so
    /// a session active across two windows contributes to both.
    DistinctSessions,
    /// sum(order_value); rows without an order_value are excluded.
    SumOrderValue,
    /// sum(percent_scroll) plus the matching event count, both kept so
    /// readers can derive a mean depth.
    ScrollDepth,
}

/// Definition of one registered metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDef {
    /// Watermark key, e.g. `total_revenue`.
    pub name: &'static str,
    /// Durable rollup table this metric merges into.
    pub rollup_table: &'static str,
    /// Event names that contribute; empty means all events qualify.
    pub event_filter: &'static [EventName],
    /// Aggregate expression for the delta computation.
    pub kind: AggregateKind,
}

impl MetricDef {
    /// Whether an event name passes this metric's filter.
    pub fn matches(&self, name: EventName) -> bool {
        self.event_filter.is_empty() || self.event_filter.contains(&name)
    }
}

/// The five production metrics, rolled up every tick.
pub fn registered_metrics() -> Vec<MetricDef> {
    vec![
        MetricDef {
            name: "add_to_cart",
            rollup_table: "funnel.add_to_cart_daily",
            event_filter: &[EventName::ProductAddedToCart],
            kind: AggregateKind::CountEvents,
        },
        MetricDef {
            name: "sessions",
            rollup_table: "funnel.sessions_daily",
            event_filter: &[],
            kind: AggregateKind::DistinctSessions,
        },
        MetricDef {
            name: "checkout_completed",
            rollup_table: "funnel.checkout_completed_daily",
            event_filter: &[EventName::CheckoutCompleted],
            kind: AggregateKind::CountEvents,
        },
        MetricDef {
            name: "scroll_depth",
            rollup_table: "funnel.scroll_depth_daily",
            event_filter: &[EventName::PageScroll, EventName::PageViewed],
            kind: AggregateKind::ScrollDepth,
        },
        MetricDef {
            name: "total_revenue",
            rollup_table: "funnel.revenue_daily",
            event_filter: &[EventName::CheckoutCompleted],
            kind: AggregateKind::SumOrderValue,
        },
    ]
}

/// Look up a registered metric by watermark key.
pub fn metric_by_name(name: &str) -> Option<MetricDef> {
    registered_metrics().into_iter().find(|m| m.name == name)
}
