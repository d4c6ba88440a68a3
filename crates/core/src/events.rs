//! Raw event types as written by the ingestion collaborator.
//!
//! The rollup engine never writes these rows; it only scans them when
//! computing deltas. Ordering across events is by `event_time` (assigned
//! by the emitting client), not arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event names accepted by the collection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    PageViewed,
    PageScroll,
    ProductAddedToCart,
    CheckoutCompleted,
}

impl EventName {
    /// Wire name as stored in the `event_name` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageViewed => "page_viewed",
            Self::PageScroll => "page_scroll",
            Self::ProductAddedToCart => "product_added_to_cart",
            Self::CheckoutCompleted => "checkout_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "page_viewed" => Some(Self::PageViewed),
            "page_scroll" => Some(Self::PageScroll),
            "product_added_to_cart" => Some(Self::ProductAddedToCart),
            "checkout_completed" => Some(Self::CheckoutCompleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user action, append-only and immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: String,
    pub event_name: EventName,
    pub event_time: DateTime<Utc>,
    pub page_url: String,
    pub session_id: String,
    pub user_id: Option<String>,
    /// Order total for checkout events.
    pub order_value: Option<f64>,
    /// Scroll depth percentage for scroll/view events.
    pub percent_scroll: Option<f64>,
}
