//! Axum router and all HTTP handlers for ironman-dashboard.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so the scenario tests in
//! `tests/` go through the router like a real client would.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use ironman_orders::{normalize, CacheError, RefreshError, RefreshOutcome};
use ironman_sources::{valid_path_id, Origin, SourceError};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    api_types::{ErrorResponse, HealthResponse, RefreshResponse, SourceStatus},
    state::{page_number, AppState},
    views,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/orders", get(orders))
        .route("/orders/:id", get(order_detail))
        .route("/v1/orders/refresh", post(refresh))
        .route("/v1/cache", get(cache_info))
        .route("/v1/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

pub(crate) async fn index() -> Redirect {
    Redirect::to("/orders")
}

// ---------------------------------------------------------------------------
// GET /orders
// ---------------------------------------------------------------------------

/// Query strings are taken raw so malformed values fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OrdersQuery {
    page: Option<String>,
    per_page: Option<String>,
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

pub(crate) async fn orders(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<OrdersQuery>,
) -> Response {
    let page = page_number(q.page.as_deref());
    let per_page = st.pages.per_page(q.per_page.as_deref());
    let htmx = is_htmx(&headers);
    info!(page, per_page, htmx, "orders page requested");

    match st.cache.get_page(page, per_page).await {
        Ok(view) => {
            let html = if htmx {
                views::orders_fragment(&view)
            } else {
                views::orders_page(&view)
            };
            Html(html).into_response()
        }
        Err(CacheError::NoData { reason }) => {
            error!(%reason, "orders unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(views::unavailable_page()),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "orders request rejected");
            (
                StatusCode::BAD_REQUEST,
                Html(views::message_page("Bad request", &e.to_string())),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /orders/:id
// ---------------------------------------------------------------------------

/// Which platform an id belongs to: `or_…` ids are Orderspace, plain
/// integers are WooCommerce, anything else is not an order id. Ids carrying
/// characters outside `[A-Za-z0-9_]` are never accepted.
pub fn origin_for_id(id: &str) -> Option<Origin> {
    if !valid_path_id(id) {
        None
    } else if id.contains("or_") {
        Some(Origin::Orderspace)
    } else if id.parse::<u64>().is_ok() {
        Some(Origin::WooCommerce)
    } else {
        None
    }
}

pub(crate) async fn order_detail(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(origin) = origin_for_id(&id) else {
        warn!(id = %id, "malformed order id");
        return (
            StatusCode::BAD_REQUEST,
            Html(views::message_page("Bad request", "Malformed order id.")),
        )
            .into_response();
    };
    info!(id = %id, source = origin.slug(), "order detail requested");

    let Some(source) = st.cache.source(origin) else {
        warn!(id = %id, source = origin.slug(), "order source not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(views::message_page(
                "Source unavailable",
                &format!("{origin} is not configured."),
            )),
        )
            .into_response();
    };

    match source.get_order(&id).await {
        Ok(order) => {
            let summary = match st.cache.find(&id).await {
                Some(cached) => cached,
                None => normalize(&order),
            };
            Html(views::order_detail_page(&order, &summary)).into_response()
        }
        Err(SourceError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Html(views::message_page(
                "Order not found",
                &format!("No {origin} order with id {id}."),
            )),
        )
            .into_response(),
        Err(SourceError::InvalidId(_)) => (
            StatusCode::BAD_REQUEST,
            Html(views::message_page("Bad request", "Malformed order id.")),
        )
            .into_response(),
        Err(e) => {
            error!(id = %id, source = origin.slug(), error = %e, "order detail fetch failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(views::message_page(
                    "Order unavailable",
                    &format!("Failed to retrieve order details from {origin}."),
                )),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/refresh
// ---------------------------------------------------------------------------

pub(crate) async fn refresh(State(st): State<Arc<AppState>>) -> Response {
    match st.cache.force_refresh().await {
        Ok(RefreshOutcome::Completed(report)) => (
            StatusCode::OK,
            Json(RefreshResponse {
                refreshed: true,
                in_flight: false,
                order_count: report.total_orders,
                sources: report.outcomes.into_iter().map(SourceStatus::from).collect(),
                error: None,
            }),
        )
            .into_response(),
        Ok(RefreshOutcome::AlreadyInFlight) => {
            let order_count = st.cache.cache_info().await.order_count;
            (
                StatusCode::ACCEPTED,
                Json(RefreshResponse {
                    refreshed: false,
                    in_flight: true,
                    order_count,
                    sources: Vec::new(),
                    error: None,
                }),
            )
                .into_response()
        }
        Err(e) => {
            let status = match e {
                RefreshError::AllSourcesFailed { .. } => StatusCode::BAD_GATEWAY,
                RefreshError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let sources = match &e {
                RefreshError::AllSourcesFailed { failures } => failures
                    .iter()
                    .map(|(origin, err)| SourceStatus {
                        origin: *origin,
                        fetched: 0,
                        error: Some(err.clone()),
                    })
                    .collect(),
                RefreshError::Aborted(_) => Vec::new(),
            };
            let order_count = st.cache.cache_info().await.order_count;
            (
                status,
                Json(RefreshResponse {
                    refreshed: false,
                    in_flight: false,
                    order_count,
                    sources,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/cache
// ---------------------------------------------------------------------------

pub(crate) async fn cache_info(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.cache.cache_info().await))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Unknown `/v1/*` paths answer JSON; everything else gets an HTML page.
pub(crate) async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/v1/") {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no route for {}", uri.path()),
            }),
        )
            .into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Html(views::message_page("Not found", "There is nothing here.")),
    )
        .into_response()
}
