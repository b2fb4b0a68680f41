//! ironman-sources
//!
//! Source adapter boundary for the orders dashboard.
//!
//! This crate owns the [`OrderSource`] contract, the platform-native order
//! records, and the two HTTP clients (WooCommerce REST and Orderspace).
//! It does **not** normalize records; that is `ironman-orders`.

mod lenient;
pub mod orderspace;
pub mod woo;

#[cfg(any(test, feature = "testkit"))]
pub mod fixture;

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use orderspace::{OrderspaceClient, OrderspaceOrder};
pub use woo::{WooClient, WooOrder};

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// The upstream platform an order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    WooCommerce,
    Orderspace,
}

impl Origin {
    pub const ALL: [Origin; 2] = [Origin::WooCommerce, Origin::Orderspace];

    /// Display name, also used as the origin tag on unified orders.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::WooCommerce => "WooCommerce",
            Origin::Orderspace => "Orderspace",
        }
    }

    /// Lowercase slug for CSS classes and log fields.
    pub fn slug(&self) -> &'static str {
        match self {
            Origin::WooCommerce => "woocommerce",
            Origin::Orderspace => "orderspace",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Source-native record
// ---------------------------------------------------------------------------

/// One order exactly as its platform returned it.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOrder {
    Woo(WooOrder),
    Orderspace(OrderspaceOrder),
}

impl SourceOrder {
    pub fn origin(&self) -> Origin {
        match self {
            SourceOrder::Woo(_) => Origin::WooCommerce,
            SourceOrder::Orderspace(_) => Origin::Orderspace,
        }
    }

    /// Platform identifier as a string (`"727"`, `"or_abc"`).
    pub fn id(&self) -> String {
        match self {
            SourceOrder::Woo(o) => o.id.to_string(),
            SourceOrder::Orderspace(o) => o.id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an [`OrderSource`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network or transport failure (including timeouts).
    Transport(String),
    /// The upstream API answered with a non-success status.
    Api { status: u16, message: String },
    /// The upstream API rejected our credentials.
    Auth(String),
    /// The requested order does not exist upstream.
    NotFound(String),
    /// The id is not valid for this platform.
    InvalidId(String),
    /// A response payload could not be decoded.
    Decode(String),
    /// Client construction failed.
    Config(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Api { status, message } => {
                write!(f, "upstream api error status={status}: {message}")
            }
            SourceError::Auth(msg) => write!(f, "upstream auth error: {msg}"),
            SourceError::NotFound(id) => write!(f, "order not found: {id}"),
            SourceError::InvalidId(id) => write!(f, "invalid order id: {id}"),
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
            SourceError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Upstream order platform contract.
///
/// Object safe so the cache can hold `Arc<dyn OrderSource>` without knowing
/// the concrete client. Timeouts are the implementation's concern.
#[async_trait::async_trait]
pub trait OrderSource: Send + Sync {
    fn origin(&self) -> Origin;

    /// Most recent orders first, at most `limit` of them.
    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<SourceOrder>, SourceError>;

    /// A single order by its platform id.
    async fn get_order(&self, id: &str) -> Result<SourceOrder, SourceError>;
}

/// Whether `id` is safe to splice into an upstream URL path as one segment:
/// non-empty ASCII letters, digits and `_` only.
pub fn valid_path_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

/// Upper bound on how much of an error body ends up in a log line.
const ERROR_BODY_PREVIEW: usize = 256;

/// Map a response onto `T`, translating status codes into [`SourceError`].
pub(crate) async fn decode_response<T: DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<T, SourceError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(what.to_string()));
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SourceError::Auth(format!(
            "{what}: status={}",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SourceError::Api {
            status: status.as_u16(),
            message: preview(&body),
        });
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(format!("{what}: {e}")))
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

pub(crate) fn build_http(timeout: std::time::Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Config(format!("http client build failed: {e}")))
}
