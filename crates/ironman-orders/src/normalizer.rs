//! Conversion of platform-native orders into [`UnifiedOrder`].
//!
//! Every function here is total: a malformed field degrades to a fallback
//! value (zero total, raw date string, "now" as sort key) and never rejects
//! the record. The only side effect is a warning log on unparsable dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::warn;

use ironman_sources::{OrderspaceOrder, Origin, SourceOrder, WooOrder};

/// Display format for order and delivery dates (`Jan 2, 2024`).
pub const DISPLAY_DATE_FORMAT: &str = "%b %-d, %Y";

/// WooCommerce `date_created`: site-local, no zone designator.
const WOO_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Orderspace `created`: UTC with a literal `Z`.
const ORDERSPACE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Orderspace `delivery_date`.
const DELIVERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Shown when an order has no delivery date.
pub const NO_DELIVERY_DATE: &str = "N/A";

// ---------------------------------------------------------------------------
// Output type
// ---------------------------------------------------------------------------

/// Source-agnostic order ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedOrder {
    /// Platform id (`"727"` for WooCommerce, `"or_…"` for Orderspace).
    pub id: String,
    /// Display form, e.g. `"#727"`.
    pub order_number: String,
    pub customer: String,
    pub order_date: String,
    pub deliver_on: String,
    /// Currency symbol + amount, e.g. `"$29.35"`.
    pub total: String,
    pub status: String,
    pub origin: Origin,
    /// Ordering key only; never rendered.
    #[serde(skip)]
    pub sort_timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Format `amount` with two decimals and the currency's symbol.
///
/// USD, GBP and EUR (case-insensitive) get a prefix symbol; anything else
/// renders as `"<amount> <CODE>"` with the code as given.
pub fn format_currency(amount: f64, currency: &str) -> String {
    match currency.trim().to_ascii_uppercase().as_str() {
        "USD" => format!("${amount:.2}"),
        "GBP" => format!("£{amount:.2}"),
        "EUR" => format!("€{amount:.2}"),
        _ => format!("{amount:.2} {}", currency.trim()),
    }
}

/// Title-case a raw status: each word capitalised, the rest lowercased.
/// `-` and `_` separate words like whitespace does (`"on-hold"` -> `"On Hold"`).
pub fn title_case(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a decimal total; anything unparsable or non-finite is zero.
fn parse_total(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Parse `raw` with `format` as UTC. On failure log, sort as `now`, and
/// display the raw string.
fn parse_placed_at(
    raw: &str,
    format: &str,
    origin: Origin,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, String) {
    match NaiveDateTime::parse_from_str(raw.trim(), format) {
        Ok(naive) => {
            let ts = naive.and_utc();
            (ts, ts.format(DISPLAY_DATE_FORMAT).to_string())
        }
        Err(e) => {
            warn!(
                source = origin.slug(),
                raw,
                error = %e,
                "order date unparsable; sorting as now"
            );
            (now, raw.to_string())
        }
    }
}

fn display_delivery_date(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => NO_DELIVERY_DATE.to_string(),
        Some(s) => match NaiveDate::parse_from_str(s, DELIVERY_DATE_FORMAT) {
            Ok(d) => d.format(DISPLAY_DATE_FORMAT).to_string(),
            Err(_) => s.to_string(),
        },
    }
}

fn first_non_empty<'a>(candidates: &[&'a str]) -> &'a str {
    candidates
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize any source record, using the current time as date fallback.
pub fn normalize(order: &SourceOrder) -> UnifiedOrder {
    normalize_at(order, Utc::now())
}

/// Normalize any source record with an explicit fallback time.
pub fn normalize_at(order: &SourceOrder, now: DateTime<Utc>) -> UnifiedOrder {
    match order {
        SourceOrder::Woo(o) => normalize_woo(o, now),
        SourceOrder::Orderspace(o) => normalize_orderspace(o, now),
    }
}

pub fn normalize_woo(order: &WooOrder, now: DateTime<Utc>) -> UnifiedOrder {
    let full_name = format!("{} {}", order.billing.first_name, order.billing.last_name);
    let customer = first_non_empty(&[&full_name, &order.billing.email]).to_string();

    let (sort_timestamp, order_date) =
        parse_placed_at(&order.date_created, WOO_DATE_FORMAT, Origin::WooCommerce, now);

    let number = first_non_empty(&[&order.number]);
    let order_number = if number.is_empty() {
        format!("#{}", order.id)
    } else {
        format!("#{number}")
    };

    UnifiedOrder {
        id: order.id.to_string(),
        order_number,
        customer,
        order_date,
        deliver_on: NO_DELIVERY_DATE.to_string(),
        total: format_currency(parse_total(&order.total), &order.currency),
        status: title_case(&order.status),
        origin: Origin::WooCommerce,
        sort_timestamp,
    }
}

pub fn normalize_orderspace(order: &OrderspaceOrder, now: DateTime<Utc>) -> UnifiedOrder {
    let customer = first_non_empty(&[
        &order.company_name,
        &order.billing_address.contact_name,
        &order.billing_address.company_name,
    ])
    .to_string();

    let (sort_timestamp, order_date) =
        parse_placed_at(&order.created, ORDERSPACE_DATE_FORMAT, Origin::Orderspace, now);

    let gross = if order.gross_total.is_finite() {
        order.gross_total
    } else {
        0.0
    };

    UnifiedOrder {
        id: order.id.clone(),
        order_number: format!("#{}", order.number),
        customer,
        order_date,
        deliver_on: display_delivery_date(order.delivery_date.as_deref()),
        total: format_currency(gross, &order.currency),
        status: title_case(&order.status),
        origin: Origin::Orderspace,
        sort_timestamp,
    }
}

/// Stable sort, newest first. Equal timestamps keep their input order.
pub fn sort_newest_first(orders: &mut [UnifiedOrder]) {
    orders.sort_by(|a, b| b.sort_timestamp.cmp(&a.sort_timestamp));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
