//! The aggregation cache: one merged, newest-first view of every source's
//! recent orders, refreshed wholesale and served page by page.
//!
//! All mutable state (orders, last refresh, refresh phase, last error) sits
//! behind a single `RwLock`. Readers take the read lock and clone the
//! `Arc<[UnifiedOrder]>`; only a finished refresh and the phase transitions
//! take the write lock.
//!
//! Single-flight: a refresh first moves the phase `Idle -> Refreshing` under
//! the write lock. Whoever loses that race gets
//! [`RefreshOutcome::AlreadyInFlight`] and reads the existing cache. The
//! refresh body runs on its own task and always returns the phase to `Idle`,
//! so a caller that gives up waiting cannot wedge the cache.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ironman_sources::{OrderSource, Origin, SourceOrder};

use crate::error::{CacheError, RefreshError};
use crate::normalizer::{normalize_at, sort_newest_first, UnifiedOrder};
use crate::pagination::{paginate, PaginatedOrders};
use crate::MAX_PAGE_SIZE;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Default time-to-live; also the background refresh period.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default number of recent orders requested from each source.
pub const DEFAULT_FETCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub fetch_limit: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one source contributed to a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub origin: Origin,
    pub fetched: usize,
    pub error: Option<String>,
}

/// A refresh that replaced the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub outcomes: Vec<SourceOutcome>,
    pub total_orders: usize,
    pub duration_ms: u64,
}

impl RefreshReport {
    /// Sources that failed while at least one sibling succeeded.
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another refresh held the single-flight slot; nothing was fetched.
    AlreadyInFlight,
}

/// Observability snapshot of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub order_count: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub age_seconds: Option<u64>,
    pub next_refresh_eta: Option<DateTime<Utc>>,
    pub refreshing: bool,
    pub last_error: Option<String>,
    pub ttl_seconds: u64,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshPhase {
    Idle,
    Refreshing,
}

#[derive(Debug, Clone, Copy)]
struct Refreshed {
    at: DateTime<Utc>,
    /// Monotonic twin of `at`, used for age and staleness.
    instant: Instant,
}

struct CacheState {
    orders: Arc<[UnifiedOrder]>,
    last_refreshed: Option<Refreshed>,
    phase: RefreshPhase,
    last_error: Option<String>,
}

impl CacheState {
    fn is_stale(&self, ttl: Duration) -> bool {
        match self.last_refreshed {
            _ if self.orders.is_empty() => true,
            None => true,
            Some(r) => r.instant.elapsed() > ttl,
        }
    }
}

struct Inner {
    sources: Vec<Arc<dyn OrderSource>>,
    settings: CacheSettings,
    state: RwLock<CacheState>,
}

/// Result of fetching one source, panics included.
struct SourceFetch {
    origin: Origin,
    result: Result<Vec<SourceOrder>, String>,
}

// ---------------------------------------------------------------------------
// OrderCache
// ---------------------------------------------------------------------------

/// Cloneable handle to the shared aggregation cache.
#[derive(Clone)]
pub struct OrderCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let origins: Vec<Origin> = self.inner.sources.iter().map(|s| s.origin()).collect();
        f.debug_struct("OrderCache")
            .field("sources", &origins)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl OrderCache {
    /// Empty cache over `sources`. Merge ties keep registration order, so
    /// register sources in the order they should win ties.
    pub fn new(sources: Vec<Arc<dyn OrderSource>>, settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                sources,
                settings,
                state: RwLock::new(CacheState {
                    orders: Arc::from(Vec::new()),
                    last_refreshed: None,
                    phase: RefreshPhase::Idle,
                    last_error: None,
                }),
            }),
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.inner.settings
    }

    /// The registered source for `origin`, if any.
    pub fn source(&self, origin: Origin) -> Option<Arc<dyn OrderSource>> {
        self.inner
            .sources
            .iter()
            .find(|s| s.origin() == origin)
            .cloned()
    }

    // --- reads ---

    /// Page `page` (1-based) of size `per_page` (`1..=MAX_PAGE_SIZE`),
    /// refreshing first when the cache is stale and no refresh is running.
    ///
    /// A failed refresh is logged and stale data served; only an empty,
    /// never-filled cache turns it into [`CacheError::NoData`].
    pub async fn get_page(&self, page: u32, per_page: u32) -> Result<PaginatedOrders, CacheError> {
        if page < 1 {
            return Err(CacheError::InvalidPage(page));
        }
        if per_page < 1 || per_page > MAX_PAGE_SIZE {
            return Err(CacheError::InvalidPageSize(per_page));
        }

        let (stale, refreshing) = {
            let state = self.inner.state.read().await;
            (
                state.is_stale(self.inner.settings.ttl),
                state.phase == RefreshPhase::Refreshing,
            )
        };

        let mut refresh_failure = None;
        if stale && !refreshing {
            info!(page, per_page, "cache stale; refreshing before read");
            match self.refresh().await {
                Ok(RefreshOutcome::Completed(_)) => {}
                Ok(RefreshOutcome::AlreadyInFlight) => {
                    info!("cache refresh already in progress; using existing cache")
                }
                Err(e) => {
                    error!(error = %e, "cache refresh failed; serving existing cache");
                    refresh_failure = Some(e);
                }
            }
        } else if stale {
            info!("cache refresh already in progress; using existing cache");
        } else {
            debug!(page, per_page, "serving from cache");
        }

        let orders = self.snapshot().await;
        if let Some(e) = refresh_failure {
            if orders.is_empty() {
                return Err(CacheError::NoData {
                    reason: e.to_string(),
                });
            }
        }
        Ok(paginate(&orders, page, per_page))
    }

    /// The whole cached sequence, newest first. No refresh is triggered.
    pub async fn snapshot(&self) -> Arc<[UnifiedOrder]> {
        Arc::clone(&self.inner.state.read().await.orders)
    }

    /// Cached unified order with this platform id. No refresh is triggered.
    pub async fn find(&self, id: &str) -> Option<UnifiedOrder> {
        self.inner
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    pub async fn cache_info(&self) -> CacheInfo {
        let ttl = self.inner.settings.ttl;
        let state = self.inner.state.read().await;
        let last = state.last_refreshed;
        CacheInfo {
            order_count: state.orders.len(),
            last_refreshed: last.map(|r| r.at),
            age_seconds: last.map(|r| r.instant.elapsed().as_secs()),
            next_refresh_eta: last
                .and_then(|r| chrono::Duration::from_std(ttl).ok().map(|d| r.at + d)),
            refreshing: state.phase == RefreshPhase::Refreshing,
            last_error: state.last_error.clone(),
            ttl_seconds: ttl.as_secs(),
        }
    }

    // --- refresh ---

    /// Refresh now regardless of age. Single-flight: if a refresh is already
    /// running this returns [`RefreshOutcome::AlreadyInFlight`] immediately.
    pub async fn force_refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        info!("manual cache refresh requested");
        self.refresh().await
    }

    /// Refresh only if stale. `Ok(None)` means the cache was fresh.
    pub async fn refresh_if_stale(&self) -> Result<Option<RefreshOutcome>, RefreshError> {
        let stale = self
            .inner
            .state
            .read()
            .await
            .is_stale(self.inner.settings.ttl);
        if !stale {
            return Ok(None);
        }
        self.refresh().await.map(Some)
    }

    async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        if !self.try_begin().await {
            return Ok(RefreshOutcome::AlreadyInFlight);
        }

        let cache = self.clone();
        let task = tokio::spawn(async move { cache.run_refresh().await });
        match task.await {
            Ok(result) => result.map(RefreshOutcome::Completed),
            Err(join_err) => {
                // Runtime shutdown, or a panic outside the guarded section.
                let reason = join_err.to_string();
                self.abort(&reason).await;
                Err(RefreshError::Aborted(reason))
            }
        }
    }

    /// `Idle -> Refreshing`, or `false` if a refresh already holds the slot.
    async fn try_begin(&self) -> bool {
        let mut state = self.inner.state.write().await;
        if state.phase == RefreshPhase::Refreshing {
            return false;
        }
        state.phase = RefreshPhase::Refreshing;
        true
    }

    async fn abort(&self, reason: &str) {
        let mut state = self.inner.state.write().await;
        state.phase = RefreshPhase::Idle;
        state.last_error = Some(format!("refresh aborted: {reason}"));
    }

    /// Fetch, normalize, merge and commit. Always leaves the phase `Idle`.
    async fn run_refresh(&self) -> Result<RefreshReport, RefreshError> {
        let started = Instant::now();
        info!(sources = self.inner.sources.len(), "cache refresh started");

        let gathered = AssertUnwindSafe(self.gather()).catch_unwind().await;
        let (merged, outcomes) = match gathered {
            Ok(v) => v,
            Err(panic) => {
                let reason = panic_message(&*panic);
                error!(reason = %reason, "cache refresh panicked while merging");
                self.abort(&reason).await;
                return Err(RefreshError::Aborted(reason));
            }
        };

        let failures: Vec<(Origin, String)> = outcomes
            .iter()
            .filter_map(|o| o.error.clone().map(|e| (o.origin, e)))
            .collect();
        let all_failed = !outcomes.is_empty() && failures.len() == outcomes.len();

        let mut state = self.inner.state.write().await;
        state.phase = RefreshPhase::Idle;

        if all_failed {
            let err = RefreshError::AllSourcesFailed { failures };
            state.last_error = Some(err.to_string());
            drop(state);
            error!(error = %err, "cache refresh failed; keeping previous cache");
            return Err(err);
        }

        let total_orders = merged.len();
        let now = Utc::now();
        state.orders = Arc::from(merged);
        state.last_refreshed = Some(Refreshed {
            at: now,
            instant: Instant::now(),
        });
        state.last_error = if failures.is_empty() {
            None
        } else {
            Some(
                failures
                    .iter()
                    .map(|(origin, e)| format!("{origin}: {e}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        drop(state);

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let next_refresh = chrono::Duration::from_std(self.inner.settings.ttl)
            .ok()
            .map(|d| (now + d).format("%H:%M:%S").to_string());
        info!(
            total_orders,
            duration_ms,
            next_refresh = next_refresh.as_deref().unwrap_or("-"),
            failed_sources = failures.len(),
            "cache refresh completed"
        );

        Ok(RefreshReport {
            outcomes,
            total_orders,
            duration_ms,
        })
    }

    /// Query every source concurrently, then normalize and merge in
    /// registration order.
    async fn gather(&self) -> (Vec<UnifiedOrder>, Vec<SourceOutcome>) {
        let limit = self.inner.settings.fetch_limit;
        let fetches = join_all(
            self.inner
                .sources
                .iter()
                .map(|source| fetch_source(Arc::clone(source), limit)),
        )
        .await;

        let now = Utc::now();
        let mut merged = Vec::new();
        let mut outcomes = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            match fetch.result {
                Ok(records) => {
                    outcomes.push(SourceOutcome {
                        origin: fetch.origin,
                        fetched: records.len(),
                        error: None,
                    });
                    merged.extend(records.iter().map(|r| normalize_at(r, now)));
                }
                Err(e) => outcomes.push(SourceOutcome {
                    origin: fetch.origin,
                    fetched: 0,
                    error: Some(e),
                }),
            }
        }
        sort_newest_first(&mut merged);
        (merged, outcomes)
    }
}

async fn fetch_source(source: Arc<dyn OrderSource>, limit: usize) -> SourceFetch {
    let origin = source.origin();
    let result = match AssertUnwindSafe(source.list_recent_orders(limit))
        .catch_unwind()
        .await
    {
        Ok(Ok(records)) => {
            debug!(source = origin.slug(), count = records.len(), "fetched orders");
            Ok(records)
        }
        Ok(Err(e)) => {
            warn!(
                source = origin.slug(),
                error = %e,
                "order fetch failed; treating as zero orders"
            );
            Err(e.to_string())
        }
        Err(panic) => {
            let reason = format!("source panicked: {}", panic_message(&*panic));
            error!(
                source = origin.slug(),
                reason = %reason,
                "order fetch panicked; treating as zero orders"
            );
            Err(reason)
        }
    };
    SourceFetch { origin, result }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
