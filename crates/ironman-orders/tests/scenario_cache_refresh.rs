//! Scenario tests for the aggregation cache: merge order, single-flight,
//! staleness and failure handling. Sources are in-memory `StaticSource`s;
//! time-dependent tests run on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use ironman_orders::{CacheError, CacheSettings, OrderCache, RefreshError, RefreshOutcome};
use ironman_sources::fixture::{Behavior, StaticSource};
use ironman_sources::orderspace::OrderspaceAddress;
use ironman_sources::woo::WooBilling;
use ironman_sources::{OrderSource, OrderspaceOrder, Origin, SourceError, SourceOrder, WooOrder};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn woo(id: u64, created: &str) -> SourceOrder {
    SourceOrder::Woo(WooOrder {
        id,
        number: id.to_string(),
        status: "processing".to_string(),
        currency: "USD".to_string(),
        date_created: created.to_string(),
        total: "10.00".to_string(),
        billing: WooBilling {
            first_name: "Pepper".to_string(),
            last_name: "Potts".to_string(),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn ospace(id: &str, number: i64, created: &str) -> SourceOrder {
    SourceOrder::Orderspace(OrderspaceOrder {
        id: id.to_string(),
        number,
        created: created.to_string(),
        status: "new".to_string(),
        currency: "GBP".to_string(),
        gross_total: 42.0,
        billing_address: OrderspaceAddress {
            contact_name: "Happy Hogan".to_string(),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn woo_source(orders: Vec<SourceOrder>) -> Arc<StaticSource> {
    Arc::new(StaticSource::with_orders(Origin::WooCommerce, orders))
}

fn orderspace_source(orders: Vec<SourceOrder>) -> Arc<StaticSource> {
    Arc::new(StaticSource::with_orders(Origin::Orderspace, orders))
}

fn cache_over(sources: &[&Arc<StaticSource>]) -> OrderCache {
    let sources: Vec<Arc<dyn OrderSource>> = sources
        .iter()
        .map(|s| Arc::clone(*s) as Arc<dyn OrderSource>)
        .collect();
    OrderCache::new(sources, CacheSettings::default())
}

fn ids(page: &ironman_orders::PaginatedOrders) -> Vec<&str> {
    page.orders.iter().map(|o| o.id.as_str()).collect()
}

fn transport(msg: &str) -> SourceError {
    SourceError::Transport(msg.to_string())
}

// ---------------------------------------------------------------------------
// Merge and sort
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merges_both_sources_newest_first() {
    let w = woo_source(vec![
        woo(101, "2024-03-01T09:00:00"),
        woo(102, "2024-03-03T09:00:00"),
        woo(103, "2024-02-27T09:00:00"),
    ]);
    let o = orderspace_source(vec![
        ospace("or_a", 2001, "2024-03-02T09:00:00Z"),
        ospace("or_b", 2002, "2024-03-04T09:00:00Z"),
    ]);
    let cache = cache_over(&[&w, &o]);

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(page.total_orders, 5);
    assert_eq!(ids(&page), ["or_b", "102", "or_a", "101", "103"]);
    for pair in page.orders.windows(2) {
        assert!(pair[0].sort_timestamp >= pair[1].sort_timestamp);
    }
    assert_eq!(page.orders[0].origin, Origin::Orderspace);
    assert_eq!(page.orders[0].customer, "Happy Hogan");
    assert_eq!(page.orders[1].total, "$10.00");
}

#[tokio::test]
async fn equal_timestamps_keep_registration_order() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00")]);
    let o = orderspace_source(vec![ospace("or_x", 9, "2024-03-01T09:00:00Z")]);
    let cache = cache_over(&[&w, &o]);

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(ids(&page), ["1", "or_x"]);
}

#[tokio::test]
async fn fetch_limit_is_passed_to_every_source() {
    let many: Vec<SourceOrder> = (0..80)
        .map(|i| woo(i, "2024-03-01T09:00:00"))
        .collect();
    let w = woo_source(many);
    let cache = OrderCache::new(
        vec![Arc::clone(&w) as Arc<dyn OrderSource>],
        CacheSettings {
            fetch_limit: 50,
            ..CacheSettings::default()
        },
    );

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(page.total_orders, 50);
    assert_eq!(page.total_pages, 5);
}

#[tokio::test]
async fn configured_page_size_bound_is_what_the_cache_accepts() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00")]);
    let cache = cache_over(&[&w]);
    let max = ironman_config::DashboardConfig::default().pagination.max_per_page;

    assert_eq!(max, ironman_orders::MAX_PAGE_SIZE);
    assert!(cache.get_page(1, max).await.is_ok());
    assert_eq!(
        cache.get_page(1, max + 1).await.unwrap_err(),
        CacheError::InvalidPageSize(max + 1)
    );
}

#[tokio::test]
async fn pagination_over_cached_orders() {
    let orders: Vec<SourceOrder> = (1..=25)
        .map(|i| woo(i, &format!("2024-03-{i:02}T09:00:00")))
        .collect();
    let w = woo_source(orders);
    let cache = cache_over(&[&w]);

    let p1 = cache.get_page(1, 10).await.unwrap();
    assert_eq!(p1.orders.len(), 10);
    assert!(p1.has_next && !p1.has_prev);
    assert_eq!(p1.orders[0].id, "25");

    let p3 = cache.get_page(3, 10).await.unwrap();
    assert_eq!(p3.orders.len(), 5);
    assert!(!p3.has_next && p3.has_prev);

    let p4 = cache.get_page(4, 10).await.unwrap();
    assert!(p4.orders.is_empty());
    assert_eq!(p4.total_pages, 3);
}

// ---------------------------------------------------------------------------
// Single-flight
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_force_refresh_runs_one_fetch_cycle() {
    let w = Arc::new(
        StaticSource::with_orders(Origin::WooCommerce, vec![woo(1, "2024-03-01T09:00:00")])
            .with_delay(Duration::from_millis(200)),
    );
    let o = Arc::new(
        StaticSource::with_orders(Origin::Orderspace, vec![ospace("or_1", 1, "2024-03-01T09:00:00Z")])
            .with_delay(Duration::from_millis(200)),
    );
    let cache = cache_over(&[&w, &o]);

    let results = join_all((0..8).map(|_| cache.force_refresh())).await;

    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok(RefreshOutcome::Completed(_))))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, Ok(RefreshOutcome::AlreadyInFlight)))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(skipped, 7);
    assert_eq!(w.calls(), 1);
    assert_eq!(o.calls(), 1);
    assert_eq!(w.max_in_flight(), 1);
    assert_eq!(o.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn sequential_refreshes_never_overlap() {
    let w = Arc::new(
        StaticSource::with_orders(Origin::WooCommerce, vec![woo(1, "2024-03-01T09:00:00")])
            .with_delay(Duration::from_millis(50)),
    );
    let cache = cache_over(&[&w]);

    for _ in 0..3 {
        let outcome = cache.force_refresh().await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Completed(_)));
    }
    assert_eq!(w.calls(), 3);
    assert_eq!(w.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn read_during_refresh_serves_existing_cache() {
    let w = Arc::new(
        StaticSource::with_orders(Origin::WooCommerce, vec![woo(1, "2024-03-01T09:00:00")])
            .with_delay(Duration::from_secs(5)),
    );
    let cache = cache_over(&[&w]);

    let background = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.force_refresh().await })
    };
    while !cache.cache_info().await.refreshing {
        tokio::task::yield_now().await;
    }

    // Empty and stale, but a refresh is already running: no second fetch.
    let page = cache.get_page(1, 10).await.unwrap();
    assert!(page.orders.is_empty());
    assert_eq!(page.total_pages, 1);
    assert_eq!(w.calls(), 1);

    background.await.unwrap().unwrap();
    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(page.total_orders, 1);
    assert_eq!(w.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_caller_does_not_wedge_refresh() {
    let w = Arc::new(
        StaticSource::with_orders(Origin::WooCommerce, vec![woo(1, "2024-03-01T09:00:00")])
            .with_delay(Duration::from_secs(1)),
    );
    let cache = cache_over(&[&w]);

    let gave_up = tokio::time::timeout(Duration::from_millis(10), cache.force_refresh()).await;
    assert!(gave_up.is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let info = cache.cache_info().await;
    assert!(!info.refreshing);
    assert_eq!(info.order_count, 1);

    let outcome = cache.force_refresh().await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Completed(_)));
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reads_within_ttl_are_served_from_cache() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00"), woo(2, "2024-03-02T09:00:00")]);
    let cache = cache_over(&[&w]);

    let first = cache.get_page(1, 10).await.unwrap();
    tokio::time::advance(Duration::from_secs(120)).await;
    let second = cache.get_page(1, 10).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(w.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn read_after_ttl_triggers_refresh() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00")]);
    let cache = cache_over(&[&w]);

    cache.get_page(1, 10).await.unwrap();
    tokio::time::advance(Duration::from_secs(299)).await;
    cache.get_page(1, 10).await.unwrap();
    assert_eq!(w.calls(), 1);

    w.set_behavior(Behavior::Orders(vec![
        woo(1, "2024-03-01T09:00:00"),
        woo(2, "2024-03-02T09:00:00"),
    ]));
    tokio::time::advance(Duration::from_secs(2)).await;
    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(w.calls(), 2);
    assert_eq!(ids(&page), ["2", "1"]);
}

#[tokio::test(start_paused = true)]
async fn refresh_if_stale_skips_fresh_cache() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00")]);
    let cache = cache_over(&[&w]);

    assert!(cache.refresh_if_stale().await.unwrap().is_some());
    assert!(cache.refresh_if_stale().await.unwrap().is_none());
    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(cache.refresh_if_stale().await.unwrap().is_some());
    assert_eq!(w.calls(), 2);
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stale_cache_is_served_when_refresh_fails() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00")]);
    let o = orderspace_source(vec![ospace("or_1", 1, "2024-03-02T09:00:00Z")]);
    let cache = cache_over(&[&w, &o]);

    let before = cache.get_page(1, 10).await.unwrap();
    let refreshed_at = cache.cache_info().await.last_refreshed;

    w.set_behavior(Behavior::Fail(transport("connection reset")));
    o.set_behavior(Behavior::Fail(transport("timeout")));
    tokio::time::advance(Duration::from_secs(600)).await;

    let after = cache.get_page(1, 10).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(w.calls(), 2);

    let info = cache.cache_info().await;
    assert_eq!(info.last_refreshed, refreshed_at);
    assert_eq!(info.order_count, 2);
    let last_error = info.last_error.unwrap();
    assert!(last_error.contains("all sources failed"), "{last_error}");
}

#[tokio::test]
async fn empty_cache_with_failing_sources_is_no_data() {
    let w = Arc::new(StaticSource::failing(Origin::WooCommerce, transport("dns")));
    let o = Arc::new(StaticSource::failing(
        Origin::Orderspace,
        SourceError::Auth("status=401".to_string()),
    ));
    let cache = cache_over(&[&w, &o]);

    match cache.get_page(1, 10).await {
        Err(CacheError::NoData { reason }) => {
            assert!(reason.contains("WooCommerce"), "{reason}");
            assert!(reason.contains("Orderspace"), "{reason}");
        }
        other => panic!("expected NoData, got {other:?}"),
    }
    assert!(!cache.cache_info().await.refreshing);
}

#[tokio::test]
async fn all_sources_failed_is_reported_and_cache_kept() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00")]);
    let cache = cache_over(&[&w]);
    cache.force_refresh().await.unwrap();

    w.set_behavior(Behavior::Fail(SourceError::Api {
        status: 500,
        message: "boom".to_string(),
    }));
    match cache.force_refresh().await {
        Err(RefreshError::AllSourcesFailed { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, Origin::WooCommerce);
        }
        other => panic!("expected AllSourcesFailed, got {other:?}"),
    }
    assert_eq!(cache.cache_info().await.order_count, 1);
}

#[tokio::test]
async fn one_failing_source_contributes_zero_orders() {
    let w = Arc::new(StaticSource::failing(Origin::WooCommerce, transport("refused")));
    let o = orderspace_source(vec![
        ospace("or_1", 1, "2024-03-01T09:00:00Z"),
        ospace("or_2", 2, "2024-03-02T09:00:00Z"),
    ]);
    let cache = cache_over(&[&w, &o]);

    let report = match cache.force_refresh().await.unwrap() {
        RefreshOutcome::Completed(report) => report,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(report.total_orders, 2);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].origin, Origin::WooCommerce);
    assert_eq!(report.outcomes[0].fetched, 0);
    assert!(report.outcomes[0].error.is_some());
    assert_eq!(report.outcomes[1].fetched, 2);
    assert_eq!(report.failed_sources().count(), 1);

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(ids(&page), ["or_2", "or_1"]);
    let info = cache.cache_info().await;
    assert!(info.last_error.unwrap().contains("WooCommerce"));
}

#[tokio::test]
async fn panicking_source_is_contained_and_phase_resets() {
    let w = Arc::new(StaticSource::new(Origin::WooCommerce, Behavior::Panic));
    let o = orderspace_source(vec![ospace("or_1", 1, "2024-03-01T09:00:00Z")]);
    let cache = cache_over(&[&w, &o]);

    let report = match cache.force_refresh().await.unwrap() {
        RefreshOutcome::Completed(report) => report,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(report.total_orders, 1);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .contains("panicked"));
    assert!(!cache.cache_info().await.refreshing);

    o.set_behavior(Behavior::Panic);
    assert!(matches!(
        cache.force_refresh().await,
        Err(RefreshError::AllSourcesFailed { .. })
    ));
    assert!(!cache.cache_info().await.refreshing);

    w.set_behavior(Behavior::Orders(vec![woo(7, "2024-03-05T09:00:00")]));
    assert!(matches!(
        cache.force_refresh().await,
        Ok(RefreshOutcome::Completed(_))
    ));
}

#[tokio::test]
async fn sources_returning_nothing_is_not_an_error() {
    let w = woo_source(Vec::new());
    let o = orderspace_source(Vec::new());
    let cache = cache_over(&[&w, &o]);

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(page.total_orders, 0);
    assert_eq!(page.total_pages, 1);
    assert!(cache.cache_info().await.last_error.is_none());
}

#[tokio::test]
async fn malformed_records_are_normalized_not_dropped() {
    let w = woo_source(vec![SourceOrder::Woo(WooOrder {
        id: 9,
        date_created: "not a date".to_string(),
        total: "abc".to_string(),
        currency: "USD".to_string(),
        ..Default::default()
    })]);
    let cache = cache_over(&[&w]);

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(page.total_orders, 1);
    assert_eq!(page.orders[0].total, "$0.00");
    assert_eq!(page.orders[0].order_date, "not a date");
}

#[tokio::test]
async fn null_heavy_upstream_records_are_counted() {
    let sparse_woo: WooOrder = serde_json::from_value(serde_json::json!({
        "id": 12,
        "status": null,
        "currency": null,
        "date_created": null,
        "total": null,
        "customer_note": null,
        "billing": {"first_name": null, "last_name": null, "email": null}
    }))
    .unwrap();
    let sparse_os: OrderspaceOrder = serde_json::from_value(serde_json::json!({
        "id": "or_sparse",
        "created": "2024-03-02T09:00:00Z",
        "company_name": null,
        "reference": null,
        "customer_po_number": null,
        "internal_note": null,
        "delivery_date": null,
        "gross_total": null,
        "billing_address": null
    }))
    .unwrap();

    let w = woo_source(vec![woo(11, "2024-03-01T09:00:00"), SourceOrder::Woo(sparse_woo)]);
    let o = orderspace_source(vec![SourceOrder::Orderspace(sparse_os)]);
    let cache = cache_over(&[&w, &o]);

    let page = cache.get_page(1, 10).await.unwrap();
    assert_eq!(page.total_orders, 3);
    let sparse = cache.find("12").await.unwrap();
    assert!(sparse.total.starts_with("0.00"), "{}", sparse.total);
    let os = cache.find("or_sparse").await.unwrap();
    assert_eq!(os.deliver_on, "N/A");
    assert!(cache.cache_info().await.last_error.is_none());
}

// ---------------------------------------------------------------------------
// Lookups and info
// ---------------------------------------------------------------------------

#[tokio::test]
async fn find_returns_cached_order_by_platform_id() {
    let w = woo_source(vec![woo(55, "2024-03-01T09:00:00")]);
    let o = orderspace_source(vec![ospace("or_z", 3, "2024-03-01T09:00:00Z")]);
    let cache = cache_over(&[&w, &o]);
    assert!(cache.find("55").await.is_none());

    cache.force_refresh().await.unwrap();
    assert_eq!(cache.find("55").await.unwrap().order_number, "#55");
    assert_eq!(cache.find("or_z").await.unwrap().origin, Origin::Orderspace);
    assert!(cache.find("56").await.is_none());
    assert!(cache.source(Origin::Orderspace).is_some());
}

#[tokio::test]
async fn cache_info_after_refresh() {
    let w = woo_source(vec![woo(1, "2024-03-01T09:00:00"), woo(2, "2024-03-02T09:00:00")]);
    let cache = cache_over(&[&w]);
    cache.force_refresh().await.unwrap();

    let info = cache.cache_info().await;
    assert_eq!(info.order_count, 2);
    assert!(!info.refreshing);
    assert_eq!(info.age_seconds, Some(0));
    assert_eq!(info.ttl_seconds, 300);
    let last = info.last_refreshed.unwrap();
    assert_eq!(
        info.next_refresh_eta.unwrap() - last,
        chrono::Duration::seconds(300)
    );

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["order_count"], 2);
    assert_eq!(json["refreshing"], false);
}
