//! Behavioral tests for the aggregation scheduler: per-metric
//! serialization and failure isolation across concurrent pipelines.

use std::sync::Arc;
use std::time::Duration;

use engine_core::{metric_by_name, registered_metrics};
use integration_tests::fixtures;
use integration_tests::mocks::{FailurePoint, MemoryStore};
use worker::{AggregationScheduler, AggregatorConfig};

fn test_config() -> AggregatorConfig {
    AggregatorConfig {
        interval_minutes: 1,
        max_concurrent_pipelines: 4,
        query_timeout_secs: 5,
        metrics_flush_secs: 60,
    }
}

async fn run_tick_to_completion(scheduler: &Arc<AggregationScheduler>) {
    for handle in scheduler.run_tick() {
        handle.await.unwrap();
    }
}

/// One metric's failure never blocks the others in the same tick, and
/// the failed metric catches up cleanly on the next one.
#[tokio::test]
async fn test_failure_is_isolated_per_metric() {
    let store = Arc::new(MemoryStore::new());
    let date = fixtures::base_time().date_naive();
    store.push_event(fixtures::checkout("/a", fixtures::base_time(), 25.0));
    store.fail_at("total_revenue", FailurePoint::MergeDelta);

    let scheduler = Arc::new(AggregationScheduler::new(
        test_config(),
        store.clone(),
        registered_metrics(),
    ));

    run_tick_to_completion(&scheduler).await;

    // Siblings merged; the failed metric did not.
    assert_eq!(
        store
            .rollup_cell("funnel.checkout_completed_daily", "/a", date)
            .unwrap()
            .value,
        1.0
    );
    assert_eq!(store.rollup_len("funnel.revenue_daily"), 0);
    assert_eq!(store.watermark("total_revenue"), None);
    assert!(store.watermark("checkout_completed").is_some());

    // Next tick: revenue recovers; already-processed metrics see empty
    // deltas and stay put.
    store.clear_failure("total_revenue");
    run_tick_to_completion(&scheduler).await;

    assert_eq!(
        store.rollup_cell("funnel.revenue_daily", "/a", date).unwrap().value,
        25.0
    );
    assert_eq!(
        store
            .rollup_cell("funnel.checkout_completed_daily", "/a", date)
            .unwrap()
            .value,
        1.0
    );
    assert_eq!(store.merge_calls("checkout_completed"), 1);
}

/// A tick that fires while a metric's previous run is still in flight
/// skips that metric instead of racing it.
#[tokio::test]
async fn test_tick_skips_metrics_still_in_flight() {
    let store = Arc::new(MemoryStore::new());
    store.push_event(fixtures::checkout("/a", fixtures::base_time(), 10.0));
    store.set_delta_delay(Duration::from_millis(200));

    let scheduler = Arc::new(AggregationScheduler::new(
        test_config(),
        store.clone(),
        vec![metric_by_name("total_revenue").unwrap()],
    ));

    let first = scheduler.run_tick();
    assert_eq!(first.len(), 1);

    // Give the spawned pipeline time to take the per-metric lock.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = scheduler.run_tick();
    assert!(second.is_empty(), "overlapping run was not skipped");

    for handle in first {
        handle.await.unwrap();
    }

    assert_eq!(store.merge_calls("total_revenue"), 1);
    let cell = store
        .rollup_cell("funnel.revenue_daily", "/a", fixtures::base_time().date_naive())
        .unwrap();
    assert_eq!(cell.value, 10.0);
}

/// After a run finishes, the next tick runs the metric again.
#[tokio::test]
async fn test_lock_releases_between_ticks() {
    let store = Arc::new(MemoryStore::new());
    let date = fixtures::base_time().date_naive();
    store.push_event(fixtures::checkout("/a", fixtures::base_time(), 10.0));

    let scheduler = Arc::new(AggregationScheduler::new(
        test_config(),
        store.clone(),
        vec![metric_by_name("total_revenue").unwrap()],
    ));

    run_tick_to_completion(&scheduler).await;

    store.push_event(fixtures::checkout("/a", fixtures::hours_after(1), 15.0));
    run_tick_to_completion(&scheduler).await;

    assert_eq!(store.merge_calls("total_revenue"), 2);
    assert_eq!(
        store.rollup_cell("funnel.revenue_daily", "/a", date).unwrap().value,
        25.0
    );
}

/// Full scheduler pass over every registered metric: each advances its
/// own watermark independently.
#[tokio::test]
async fn test_every_metric_gets_its_own_watermark() {
    let store = Arc::new(MemoryStore::new());
    store.push_event(fixtures::page_view("/a", fixtures::base_time(), "s1"));
    store.push_event(fixtures::add_to_cart("/a", fixtures::hours_after(1), "s1"));
    store.push_event(fixtures::checkout("/a", fixtures::hours_after(2), 12.0));

    let scheduler = Arc::new(AggregationScheduler::new(
        test_config(),
        store.clone(),
        registered_metrics(),
    ));
    run_tick_to_completion(&scheduler).await;

    // Sessions scans all events; its watermark reaches the checkout.
    assert_eq!(store.watermark("sessions"), Some(fixtures::hours_after(2)));
    // Cart watermark stops at the last cart event.
    assert_eq!(
        store.watermark("add_to_cart"),
        Some(fixtures::hours_after(1))
    );
    // Scroll depth saw only the page view.
    assert_eq!(
        store.watermark("scroll_depth"),
        Some(fixtures::base_time())
    );
}
