//! Server-rendered HTML for the dashboard.
//!
//! Plain string builders; every value that came from an upstream platform
//! goes through [`escape`]. The orders table is also served on its own as an
//! HTMX fragment (`#orders-table`) so pagination swaps it in place.

use ironman_orders::{format_currency, PageLink, PaginatedOrders, UnifiedOrder};
use ironman_sources::orderspace::OrderspaceAddress;
use ironman_sources::woo::WooAddress;
use ironman_sources::{OrderspaceOrder, Origin, SourceOrder, WooOrder};

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@1.9.12";
const TAILWIND_SRC: &str = "https://cdn.tailwindcss.com";

const PAGE_LINK_CLASS: &str = "inline-flex items-center border-t-2 border-transparent px-4 pt-4 \
     text-sm font-medium text-gray-500 hover:border-gray-300 hover:text-gray-700";
const PAGE_CURRENT_CLASS: &str = "inline-flex items-center border-t-2 border-indigo-500 px-4 pt-4 \
     text-sm font-medium text-indigo-600";
const PAGE_GAP_CLASS: &str = "inline-flex items-center border-t-2 border-transparent px-4 pt-4 \
     text-sm font-medium text-gray-500";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn row_class(origin: Origin) -> &'static str {
    match origin {
        Origin::WooCommerce => "origin-woocommerce",
        Origin::Orderspace => "origin-orderspace",
    }
}

pub fn origin_badge_class(origin: Origin) -> &'static str {
    match origin {
        Origin::WooCommerce => {
            "px-2 py-1 rounded-full text-xs font-medium bg-blue-100 text-blue-800"
        }
        Origin::Orderspace => {
            "px-2 py-1 rounded-full text-xs font-medium bg-green-100 text-green-800"
        }
    }
}

pub fn origin_circle_class(origin: Origin) -> &'static str {
    match origin {
        Origin::WooCommerce => "bg-blue-400",
        Origin::Orderspace => "bg-green-400",
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<script src="{TAILWIND_SRC}"></script>
<script src="{HTMX_SRC}"></script>
</head>
<body class="bg-gray-50 text-gray-900">
<main class="mx-auto max-w-7xl px-4 py-8">
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn orders_href(page: u32, per_page: u32) -> String {
    format!("/orders?page={page}&amp;per_page={per_page}")
}

fn page_anchor(page: u32, per_page: u32, label: &str, class: &str, current: bool) -> String {
    let href = orders_href(page, per_page);
    let aria = if current { r#" aria-current="page""# } else { "" };
    format!(
        r##"<a href="{href}" hx-get="{href}" hx-target="#orders-table" hx-swap="outerHTML" hx-push-url="true"{aria} class="{class}">{label}</a>"##
    )
}

// ---------------------------------------------------------------------------
// Orders list
// ---------------------------------------------------------------------------

/// Full orders page: layout, header, summary and the table fragment.
pub fn orders_page(page: &PaginatedOrders) -> String {
    let mut body = String::new();
    body.push_str(
        r##"<div class="flex items-center justify-between mb-6">
<h1 class="text-2xl font-semibold">Orders</h1>
<button type="button" class="rounded-md bg-indigo-600 px-3 py-2 text-sm font-semibold text-white"
  hx-post="/v1/orders/refresh" hx-swap="none"
  hx-on::after-request="htmx.ajax('GET', window.location.pathname + window.location.search, {target: '#orders-table', swap: 'outerHTML'})">Refresh</button>
</div>
"##,
    );
    body.push_str(&orders_fragment(page));
    layout("Orders", &body)
}

/// The swappable `#orders-table` block: origin summary, table, pagination.
pub fn orders_fragment(page: &PaginatedOrders) -> String {
    let mut out = String::from(r#"<div id="orders-table">"#);
    out.push('\n');

    out.push_str(r#"<div class="flex gap-6 mb-4 text-sm text-gray-600">"#);
    out.push_str(&format!(
        "<span>Showing {} of {} orders</span>",
        page.orders.len(),
        page.total_orders
    ));
    for (origin, count) in page.count_by_origin() {
        out.push_str(&format!(
            r#"<span class="inline-flex items-center gap-1"><span class="h-2 w-2 rounded-full {}"></span>{}: {}</span>"#,
            origin_circle_class(origin),
            origin.as_str(),
            count
        ));
    }
    out.push_str("</div>\n");

    out.push_str(
        r#"<table class="min-w-full divide-y divide-gray-300">
<thead><tr>
<th class="px-3 py-3 text-left text-sm font-semibold">Order</th>
<th class="px-3 py-3 text-left text-sm font-semibold">Customer</th>
<th class="px-3 py-3 text-left text-sm font-semibold">Date</th>
<th class="px-3 py-3 text-left text-sm font-semibold">Deliver On</th>
<th class="px-3 py-3 text-left text-sm font-semibold">Total</th>
<th class="px-3 py-3 text-left text-sm font-semibold">Status</th>
<th class="px-3 py-3 text-left text-sm font-semibold">Origin</th>
</tr></thead>
<tbody class="divide-y divide-gray-200">
"#,
    );
    if page.orders.is_empty() {
        out.push_str(
            r#"<tr><td colspan="7" class="px-3 py-6 text-center text-sm text-gray-500">No orders found</td></tr>"#,
        );
        out.push('\n');
    }
    for order in &page.orders {
        out.push_str(&order_row(order));
    }
    out.push_str("</tbody>\n</table>\n");

    out.push_str(&pagination_nav(page));
    out.push_str("</div>\n");
    out
}

fn order_row(order: &UnifiedOrder) -> String {
    format!(
        r#"<tr class="{row}">
<td class="px-3 py-4 text-sm"><a class="text-indigo-600 hover:underline" href="/orders/{id_attr}">{number}</a></td>
<td class="px-3 py-4 text-sm">{customer}</td>
<td class="px-3 py-4 text-sm">{date}</td>
<td class="px-3 py-4 text-sm">{deliver}</td>
<td class="px-3 py-4 text-sm">{total}</td>
<td class="px-3 py-4 text-sm">{status}</td>
<td class="px-3 py-4 text-sm"><span class="{badge}">{origin}</span></td>
</tr>
"#,
        row = row_class(order.origin),
        id_attr = escape(&order.id),
        number = escape(&order.order_number),
        customer = escape(&order.customer),
        date = escape(&order.order_date),
        deliver = escape(&order.deliver_on),
        total = escape(&order.total),
        status = escape(&order.status),
        badge = origin_badge_class(order.origin),
        origin = order.origin.as_str(),
    )
}

fn pagination_nav(page: &PaginatedOrders) -> String {
    let per_page = page.per_page;
    let mut out = String::from(
        r#"<nav class="flex items-center justify-between border-t border-gray-200 px-4 mt-4">"#,
    );

    out.push_str(r#"<div class="-mt-px flex w-0 flex-1">"#);
    if let Some(prev) = page.prev_page() {
        out.push_str(&page_anchor(prev, per_page, "Previous", PAGE_LINK_CLASS, false));
    }
    out.push_str("</div>");

    out.push_str(r#"<div class="hidden md:-mt-px md:flex">"#);
    for link in page.page_links() {
        match link {
            PageLink::Page {
                number,
                current: true,
            } => out.push_str(&page_anchor(
                number,
                per_page,
                &number.to_string(),
                PAGE_CURRENT_CLASS,
                true,
            )),
            PageLink::Page { number, .. } => out.push_str(&page_anchor(
                number,
                per_page,
                &number.to_string(),
                PAGE_LINK_CLASS,
                false,
            )),
            PageLink::Ellipsis => {
                out.push_str(&format!(r#"<span class="{PAGE_GAP_CLASS}">...</span>"#))
            }
        }
    }
    out.push_str("</div>");

    out.push_str(r#"<div class="-mt-px flex w-0 flex-1 justify-end">"#);
    if let Some(next) = page.next_page() {
        out.push_str(&page_anchor(next, per_page, "Next", PAGE_LINK_CLASS, false));
    }
    out.push_str("</div>");

    out.push_str(&format!(
        r#"<p class="text-sm text-gray-500">Page {} of {}</p>"#,
        page.current_page, page.total_pages
    ));
    out.push_str("</nav>\n");
    out
}

// ---------------------------------------------------------------------------
// Detail pages
// ---------------------------------------------------------------------------

/// Detail page for one platform record, headed by its unified summary.
pub fn order_detail_page(order: &SourceOrder, summary: &UnifiedOrder) -> String {
    let detail = match order {
        SourceOrder::Woo(o) => woo_detail(o),
        SourceOrder::Orderspace(o) => orderspace_detail(o),
    };
    let title = format!("Order {}", summary.order_number);

    let mut body = String::from(
        r#"<a href="/orders" class="text-sm text-indigo-600 hover:underline">&larr; Back to orders</a>"#,
    );
    body.push_str(&format!(
        r#"
<div class="mt-4 mb-6 flex items-center gap-3">
<h1 class="text-2xl font-semibold">{title}</h1>
<span class="{badge}">{origin}</span>
<span class="text-sm text-gray-600">{status}</span>
</div>
<dl class="grid grid-cols-2 gap-4 text-sm mb-8">
{customer}{date}{deliver}{total}</dl>
"#,
        title = escape(&title),
        badge = origin_badge_class(summary.origin),
        origin = summary.origin.as_str(),
        status = escape(&summary.status),
        customer = field("Customer", &summary.customer),
        date = field("Order date", &summary.order_date),
        deliver = field("Deliver on", &summary.deliver_on),
        total = field("Total", &summary.total),
    ));
    body.push_str(&detail);
    layout(&title, &body)
}

fn field(label: &str, value: &str) -> String {
    let value = if value.trim().is_empty() { "-" } else { value };
    format!(
        "<div><dt class=\"font-medium text-gray-500\">{}</dt><dd>{}</dd></div>\n",
        escape(label),
        escape(value)
    )
}

fn lines_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::from(
        r#"<table class="min-w-full divide-y divide-gray-300 mb-8"><thead><tr>"#,
    );
    for h in headers {
        out.push_str(&format!(
            r#"<th class="px-3 py-2 text-left text-sm font-semibold">{}</th>"#,
            escape(h)
        ));
    }
    out.push_str("</tr></thead><tbody>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!(
                r#"<td class="px-3 py-2 text-sm">{}</td>"#,
                escape(cell)
            ));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table>\n");
    out
}

fn join_non_empty(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

fn woo_address(a: &WooAddress) -> String {
    let name = join_non_empty(&[&a.first_name, &a.last_name], " ");
    join_non_empty(
        &[&name, &a.company, &a.address_1, &a.city, &a.postcode, &a.country],
        ", ",
    )
}

fn woo_detail(o: &WooOrder) -> String {
    let b = &o.billing;
    let billing_name = join_non_empty(&[&b.first_name, &b.last_name], " ");
    let billing = join_non_empty(
        &[&billing_name, &b.company, &b.address_1, &b.city, &b.postcode, &b.country],
        ", ",
    );

    let mut out = String::from(r#"<h2 class="text-lg font-semibold mb-2">Details</h2>"#);
    out.push_str("\n<dl class=\"grid grid-cols-2 gap-4 text-sm mb-8\">\n");
    out.push_str(&field("Email", &b.email));
    out.push_str(&field("Phone", &b.phone));
    out.push_str(&field("Billing address", &billing));
    out.push_str(&field("Shipping address", &woo_address(&o.shipping)));
    out.push_str(&field("Payment method", &o.payment_method_title));
    out.push_str(&field("Customer note", &o.customer_note));
    out.push_str("</dl>\n");

    let rows: Vec<Vec<String>> = o
        .line_items
        .iter()
        .map(|l| {
            let total = l.total.trim().parse::<f64>().unwrap_or(0.0);
            vec![
                l.sku.clone(),
                l.name.clone(),
                l.quantity.to_string(),
                format_currency(total, &o.currency),
            ]
        })
        .collect();
    out.push_str(r#"<h2 class="text-lg font-semibold mb-2">Line items</h2>"#);
    out.push('\n');
    out.push_str(&lines_table(&["SKU", "Item", "Qty", "Total"], &rows));
    out
}

fn orderspace_address(a: &OrderspaceAddress) -> String {
    join_non_empty(
        &[
            &a.company_name,
            &a.contact_name,
            &a.line1,
            &a.line2,
            &a.city,
            &a.state,
            &a.postal_code,
            &a.country,
        ],
        ", ",
    )
}

fn orderspace_detail(o: &OrderspaceOrder) -> String {
    let mut out = String::from(r#"<h2 class="text-lg font-semibold mb-2">Details</h2>"#);
    out.push_str("\n<dl class=\"grid grid-cols-2 gap-4 text-sm mb-8\">\n");
    out.push_str(&field("Orders email", &o.email_addresses.orders));
    out.push_str(&field("Phone", &o.phone));
    out.push_str(&field("Reference", &o.reference));
    out.push_str(&field("Customer PO", &o.customer_po_number));
    out.push_str(&field("Shipping type", &o.shipping_type));
    out.push_str(&field("Net total", &format_currency(o.net_total, &o.currency)));
    out.push_str(&field("Billing address", &orderspace_address(&o.billing_address)));
    out.push_str(&field("Shipping address", &orderspace_address(&o.shipping_address)));
    out.push_str(&field("Customer note", &o.customer_note));
    out.push_str(&field("Internal note", &o.internal_note));
    out.push_str("</dl>\n");

    let rows: Vec<Vec<String>> = o
        .order_lines
        .iter()
        .map(|l| {
            vec![
                l.sku.clone(),
                l.name.clone(),
                l.quantity.to_string(),
                format_currency(l.unit_price, &o.currency),
                format_currency(l.sub_total, &o.currency),
            ]
        })
        .collect();
    out.push_str(r#"<h2 class="text-lg font-semibold mb-2">Order lines</h2>"#);
    out.push('\n');
    out.push_str(&lines_table(
        &["SKU", "Item", "Qty", "Unit price", "Subtotal"],
        &rows,
    ));
    out
}

// ---------------------------------------------------------------------------
// Error pages
// ---------------------------------------------------------------------------

pub fn message_page(title: &str, message: &str) -> String {
    let body = format!(
        r#"<h1 class="text-2xl font-semibold mb-4">{}</h1>
<p class="text-gray-600">{}</p>
<p class="mt-6"><a href="/orders" class="text-indigo-600 hover:underline">Back to orders</a></p>
"#,
        escape(title),
        escape(message)
    );
    layout(title, &body)
}

pub fn unavailable_page() -> String {
    message_page(
        "Orders unavailable",
        "Orders could not be loaded from any source. Please try again shortly.",
    )
}
