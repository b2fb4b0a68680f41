//! Request and response types for the JSON endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use ironman_orders::SourceOutcome;
use ironman_sources::Origin;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// /v1/orders/refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub origin: Origin,
    pub fetched: usize,
    pub error: Option<String>,
}

impl From<SourceOutcome> for SourceStatus {
    fn from(o: SourceOutcome) -> Self {
        Self {
            origin: o.origin,
            fetched: o.fetched,
            error: o.error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// The cache was replaced by this call.
    pub refreshed: bool,
    /// Another refresh was already running; this call did nothing.
    pub in_flight: bool,
    /// Orders in the cache after the call.
    pub order_count: usize,
    pub sources: Vec<SourceStatus>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
