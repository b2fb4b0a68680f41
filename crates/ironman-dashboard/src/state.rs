//! Shared runtime state for ironman-dashboard.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use ironman_orders::{OrderCache, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "ironman-dashboard",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// ---------------------------------------------------------------------------
// PageDefaults
// ---------------------------------------------------------------------------

/// Page-size policy applied to `?per_page=` before it reaches the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDefaults {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: MAX_PAGE_SIZE,
        }
    }
}

impl PageDefaults {
    /// `raw` if it parses into `1..=max_per_page`, else the default.
    pub fn per_page(&self, raw: Option<&str>) -> u32 {
        let max = self.max_per_page.clamp(1, MAX_PAGE_SIZE);
        raw.and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| (1..=max).contains(n))
            .unwrap_or_else(|| self.default_per_page.clamp(1, max))
    }
}

/// `raw` if it parses to a positive page number, else 1.
pub fn page_number(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Static build metadata.
    pub build: BuildInfo,
    /// SHA-256 of the merged configuration, surfaced in /v1/health.
    pub config_hash: String,
    /// The aggregation cache; also owns the source adapters used by detail
    /// pages.
    pub cache: OrderCache,
    pub pages: PageDefaults,
}

impl AppState {
    pub fn new(cache: OrderCache, config_hash: impl Into<String>, pages: PageDefaults) -> Self {
        Self {
            build: BuildInfo::default(),
            config_hash: config_hash.into(),
            cache,
            pages,
        }
    }
}
