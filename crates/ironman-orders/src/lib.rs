//! ironman-orders
//!
//! The order aggregation core of the dashboard:
//! - [`normalizer`]: platform records to [`UnifiedOrder`]
//! - [`cache`]: the single-flight, TTL-bounded [`OrderCache`]
//! - [`pagination`]: page views and the page-number strip
//! - [`refresher`]: the cancellable periodic refresh task
//!
//! Pure in-process library; it owns no I/O beyond calling the
//! [`ironman_sources::OrderSource`] adapters it is given.

pub mod cache;
pub mod error;
pub mod normalizer;
pub mod pagination;
pub mod refresher;

/// Largest page size a caller may request; the same bound config validation
/// enforces.
pub use ironman_config::MAX_PAGE_SIZE;

pub use cache::{
    CacheInfo, CacheSettings, OrderCache, RefreshOutcome, RefreshReport, SourceOutcome,
    DEFAULT_FETCH_LIMIT, DEFAULT_TTL,
};
pub use error::{CacheError, RefreshError};
pub use normalizer::{format_currency, normalize, normalize_at, title_case, UnifiedOrder};
pub use pagination::{page_links, paginate, PageLink, PaginatedOrders};
pub use refresher::spawn_background_refresh;
