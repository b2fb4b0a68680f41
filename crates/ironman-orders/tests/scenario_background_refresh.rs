//! Background refresher: immediate initial load, one refresh per interval,
//! prompt exit on cancellation. Runs on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use ironman_orders::{spawn_background_refresh, CacheSettings, OrderCache};
use ironman_sources::fixture::StaticSource;
use ironman_sources::{OrderSource, Origin, SourceOrder, WooOrder};
use tokio_util::sync::CancellationToken;

fn source(delay: Option<Duration>) -> Arc<StaticSource> {
    let order = SourceOrder::Woo(WooOrder {
        id: 1,
        number: "1".to_string(),
        date_created: "2024-03-01T09:00:00".to_string(),
        total: "5.00".to_string(),
        currency: "USD".to_string(),
        ..Default::default()
    });
    let s = StaticSource::with_orders(Origin::WooCommerce, vec![order]);
    Arc::new(match delay {
        Some(d) => s.with_delay(d),
        None => s,
    })
}

fn cache_over(s: &Arc<StaticSource>) -> OrderCache {
    OrderCache::new(
        vec![Arc::clone(s) as Arc<dyn OrderSource>],
        CacheSettings::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn loads_immediately_then_once_per_interval() {
    let src = source(None);
    let cache = cache_over(&src);
    let cancel = CancellationToken::new();
    let handle = spawn_background_refresh(cache.clone(), Duration::from_secs(300), cancel.clone());

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(src.calls(), 1);
    assert_eq!(cache.cache_info().await.order_count, 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(src.calls(), 2);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(src.calls(), 3);

    cancel.cancel();
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(1_000)).await;
    assert_eq!(src.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_refresh_exits_promptly() {
    let src = source(Some(Duration::from_secs(30)));
    let cache = cache_over(&src);
    let cancel = CancellationToken::new();
    let handle = spawn_background_refresh(cache.clone(), Duration::from_secs(300), cancel.clone());

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(cache.cache_info().await.refreshing);

    cancel.cancel();
    tokio::time::timeout(Duration::from_millis(10), handle)
        .await
        .expect("refresher did not stop")
        .unwrap();

    // The abandoned refresh still finishes and releases the single-flight slot.
    tokio::time::sleep(Duration::from_secs(31)).await;
    let info = cache.cache_info().await;
    assert!(!info.refreshing);
    assert_eq!(info.order_count, 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_token_never_refreshes() {
    let src = source(None);
    let cache = cache_over(&src);
    let cancel = CancellationToken::new();
    cancel.cancel();

    spawn_background_refresh(cache, Duration::from_secs(300), cancel)
        .await
        .unwrap();
    assert_eq!(src.calls(), 0);
}
