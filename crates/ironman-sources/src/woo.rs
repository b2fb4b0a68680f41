//! WooCommerce REST (v3) order client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    build_http, decode_response, lenient, OrderSource, Origin, SourceError, SourceOrder,
};

/// A WooCommerce order. Only the fields the dashboard reads are modelled.
/// Every field is decoded leniently: missing, `null` or mistyped values take
/// their empty default instead of failing the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooOrder {
    #[serde(deserialize_with = "lenient::uint")]
    pub id: u64,
    #[serde(deserialize_with = "lenient::string")]
    pub number: String,
    #[serde(deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(deserialize_with = "lenient::string")]
    pub currency: String,
    /// Site-local timestamp without zone, e.g. `2024-03-22T16:28:02`.
    #[serde(deserialize_with = "lenient::string")]
    pub date_created: String,
    /// Decimal string, e.g. `"29.35"`.
    #[serde(deserialize_with = "lenient::string")]
    pub total: String,
    #[serde(deserialize_with = "lenient::string")]
    pub customer_note: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payment_method_title: String,
    #[serde(deserialize_with = "lenient::object")]
    pub billing: WooBilling,
    #[serde(deserialize_with = "lenient::object")]
    pub shipping: WooAddress,
    #[serde(deserialize_with = "lenient::list")]
    pub line_items: Vec<WooLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooBilling {
    #[serde(deserialize_with = "lenient::string")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub company: String,
    #[serde(deserialize_with = "lenient::string")]
    pub address_1: String,
    #[serde(deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(deserialize_with = "lenient::string")]
    pub postcode: String,
    #[serde(deserialize_with = "lenient::string")]
    pub country: String,
    #[serde(deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooAddress {
    #[serde(deserialize_with = "lenient::string")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub company: String,
    #[serde(deserialize_with = "lenient::string")]
    pub address_1: String,
    #[serde(deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(deserialize_with = "lenient::string")]
    pub postcode: String,
    #[serde(deserialize_with = "lenient::string")]
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooLineItem {
    #[serde(deserialize_with = "lenient::uint")]
    pub id: u64,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub sku: String,
    #[serde(deserialize_with = "lenient::int")]
    pub quantity: i64,
    #[serde(deserialize_with = "lenient::string")]
    pub total: String,
}

/// WooCommerce-backed [`OrderSource`].
///
/// Consumer key/secret are passed in by the caller; do not log them.
#[derive(Clone)]
pub struct WooClient {
    http: reqwest::Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl std::fmt::Debug for WooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WooClient {
    pub fn new(
        base_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http: build_http(timeout)?,
            base_url: base_url.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        })
    }

    fn orders_url(&self) -> String {
        format!("{}/wp-json/wc/v3/orders", self.base_url.trim_end_matches('/'))
    }

    /// `GET /orders` newest first.
    pub async fn list_orders(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<WooOrder>, SourceError> {
        debug!(page, per_page, "woocommerce list orders");
        let resp = self
            .http
            .get(self.orders_url())
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(&[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("orderby", "date".to_string()),
                ("order", "desc".to_string()),
            ])
            .send()
            .await?;

        let raw: Vec<serde_json::Value> = decode_response(resp, "woocommerce orders").await?;
        Ok(lenient::records(raw))
    }

    /// `GET /orders/{id}`.
    pub async fn fetch_order(&self, id: u64) -> Result<WooOrder, SourceError> {
        debug!(id, "woocommerce get order");
        let resp = self
            .http
            .get(format!("{}/{}", self.orders_url(), id))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await?;

        match decode_response(resp, "woocommerce order").await {
            Err(SourceError::NotFound(_)) => Err(SourceError::NotFound(id.to_string())),
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl OrderSource for WooClient {
    fn origin(&self) -> Origin {
        Origin::WooCommerce
    }

    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<SourceOrder>, SourceError> {
        let orders = self.list_orders(1, limit).await?;
        Ok(orders.into_iter().map(SourceOrder::Woo).collect())
    }

    async fn get_order(&self, id: &str) -> Result<SourceOrder, SourceError> {
        let numeric: u64 = id
            .trim()
            .parse()
            .map_err(|_| SourceError::InvalidId(id.to_string()))?;
        self.fetch_order(numeric).await.map(SourceOrder::Woo)
    }
}
