//! Orderspace wholesale-order API client.
//!
//! Auth is OAuth2 client credentials. The bearer token is cached and reused
//! until shortly before it expires; a 401/403 from the API drops it so the
//! next call fetches a fresh one.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    build_http, decode_response, lenient, valid_path_id, OrderSource, Origin, SourceError,
    SourceOrder,
};

/// Tokens are renewed this long before their advertised expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// An Orderspace order. Every field is decoded leniently: missing, `null`
/// or mistyped values take their empty default instead of failing the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderspaceOrder {
    /// `or_…` identifier.
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::int")]
    pub number: i64,
    /// UTC timestamp, e.g. `2024-01-14T11:31:54Z`.
    #[serde(deserialize_with = "lenient::string")]
    pub created: String,
    #[serde(deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(deserialize_with = "lenient::string")]
    pub customer_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub company_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::object")]
    pub email_addresses: OrderspaceEmails,
    /// `YYYY-MM-DD`, absent when no delivery date was requested.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub delivery_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub reference: String,
    #[serde(deserialize_with = "lenient::string")]
    pub customer_po_number: String,
    #[serde(deserialize_with = "lenient::string")]
    pub customer_note: String,
    #[serde(deserialize_with = "lenient::string")]
    pub internal_note: String,
    #[serde(deserialize_with = "lenient::string")]
    pub shipping_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub currency: String,
    #[serde(deserialize_with = "lenient::float")]
    pub net_total: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub gross_total: f64,
    #[serde(deserialize_with = "lenient::object")]
    pub shipping_address: OrderspaceAddress,
    #[serde(deserialize_with = "lenient::object")]
    pub billing_address: OrderspaceAddress,
    #[serde(deserialize_with = "lenient::list")]
    pub order_lines: Vec<OrderspaceLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderspaceEmails {
    #[serde(deserialize_with = "lenient::string")]
    pub orders: String,
    #[serde(deserialize_with = "lenient::string")]
    pub dispatches: String,
    #[serde(deserialize_with = "lenient::string")]
    pub invoices: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderspaceAddress {
    #[serde(deserialize_with = "lenient::string")]
    pub company_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contact_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub line1: String,
    #[serde(deserialize_with = "lenient::string")]
    pub line2: String,
    #[serde(deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(deserialize_with = "lenient::string")]
    pub postal_code: String,
    #[serde(deserialize_with = "lenient::string")]
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderspaceLine {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub sku: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::int")]
    pub quantity: i64,
    #[serde(deserialize_with = "lenient::float")]
    pub unit_price: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub sub_total: f64,
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    #[serde(default, deserialize_with = "lenient::list")]
    orders: Vec<OrderspaceOrder>,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: OrderspaceOrder,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Orderspace-backed [`OrderSource`].
pub struct OrderspaceClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for OrderspaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderspaceClient")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl OrderspaceClient {
    pub fn new(
        base_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http: build_http(timeout)?,
            base_url: base_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: Mutex::new(None),
        })
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.base_url.trim_end_matches('/'))
    }

    async fn bearer(&self) -> Result<String, SourceError> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.access_token.clone());
        }

        debug!("orderspace requesting access token");
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = match decode_response(resp, "orderspace token").await {
            Err(SourceError::NotFound(what)) => {
                return Err(SourceError::Auth(format!("{what}: token endpoint missing")))
            }
            other => other?,
        };

        let access_token = token.access_token.clone();
        *slot = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, SourceError> {
        let bearer = self.bearer().await?;
        let mut req = self.http.get(url).bearer_auth(bearer);
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req.send().await?;

        let out = decode_response(resp, what).await;
        if let Err(SourceError::Auth(reason)) = &out {
            warn!(%reason, "orderspace rejected token; dropping cached token");
            self.forget_token().await;
        }
        out
    }

    /// `GET /v1/orders?limit=N`.
    pub async fn list_orders(&self, limit: usize) -> Result<Vec<OrderspaceOrder>, SourceError> {
        debug!(limit, "orderspace list orders");
        let envelope: OrdersEnvelope = self
            .get_json(
                self.orders_url(),
                &[("limit", limit.to_string())],
                "orderspace orders",
            )
            .await?;
        Ok(envelope.orders)
    }

    /// `GET /v1/orders/{id}`.
    pub async fn fetch_order(&self, id: &str) -> Result<OrderspaceOrder, SourceError> {
        debug!(id, "orderspace get order");
        let url = format!("{}/{}", self.orders_url(), id);
        match self.get_json::<OrderEnvelope>(url, &[], "orderspace order").await {
            Ok(envelope) => Ok(envelope.order),
            Err(SourceError::NotFound(_)) => Err(SourceError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl OrderSource for OrderspaceClient {
    fn origin(&self) -> Origin {
        Origin::Orderspace
    }

    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<SourceOrder>, SourceError> {
        let orders = self.list_orders(limit).await?;
        Ok(orders.into_iter().map(SourceOrder::Orderspace).collect())
    }

    async fn get_order(&self, id: &str) -> Result<SourceOrder, SourceError> {
        let id = id.trim();
        if !valid_path_id(id) {
            return Err(SourceError::InvalidId(id.to_string()));
        }
        self.fetch_order(id).await.map(SourceOrder::Orderspace)
    }
}
