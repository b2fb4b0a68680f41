use std::fmt;

use ironman_sources::Origin;

/// Caller-facing failures of [`crate::OrderCache::get_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Page numbers start at 1.
    InvalidPage(u32),
    /// Page size outside `1..=MAX_PAGE_SIZE`.
    InvalidPageSize(u32),
    /// Nothing has ever been cached and the refresh needed to fill the cache
    /// failed.
    NoData { reason: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidPage(p) => write!(f, "invalid page {p}: pages start at 1"),
            CacheError::InvalidPageSize(n) => write!(
                f,
                "invalid page size {n}: must be 1..={}",
                crate::MAX_PAGE_SIZE
            ),
            CacheError::NoData { reason } => {
                write!(f, "no cached data available and refresh failed: {reason}")
            }
        }
    }
}

impl std::error::Error for CacheError {}

/// A refresh that did not replace the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Every registered source failed; the previous cache was kept.
    AllSourcesFailed { failures: Vec<(Origin, String)> },
    /// The refresh task died outside the per-source guards.
    Aborted(String),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::AllSourcesFailed { failures } => {
                write!(f, "all sources failed")?;
                for (i, (origin, err)) in failures.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{sep}{origin}: {err}")?;
                }
                Ok(())
            }
            RefreshError::Aborted(msg) => write!(f, "refresh aborted: {msg}"),
        }
    }
}

impl std::error::Error for RefreshError {}
