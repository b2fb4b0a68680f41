//! Page views over the cached order sequence.

use serde::Serialize;

use ironman_sources::Origin;

use crate::normalizer::UnifiedOrder;

/// How many page numbers to show on each side of the current page.
const PAGE_WINDOW: u32 = 2;

/// One page of unified orders plus navigation metadata.
///
/// Derived on every read; never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedOrders {
    pub orders: Vec<UnifiedOrder>,
    pub current_page: u32,
    /// Always at least 1, even with no orders.
    pub total_pages: u32,
    pub total_orders: usize,
    pub per_page: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Entry in the page-number strip under the orders table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageLink {
    Page { number: u32, current: bool },
    Ellipsis,
}

/// Slice `all` into page `page` of size `per_page`.
///
/// Callers validate `page >= 1` and `per_page >= 1`; an out-of-range page
/// yields no orders but still-correct metadata.
pub fn paginate(all: &[UnifiedOrder], page: u32, per_page: u32) -> PaginatedOrders {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total_orders = all.len();

    let total_pages = total_orders.div_ceil(per_page as usize).max(1);
    let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);

    let start = (page as usize - 1)
        .saturating_mul(per_page as usize)
        .min(total_orders);
    let end = start.saturating_add(per_page as usize).min(total_orders);

    PaginatedOrders {
        orders: all[start..end].to_vec(),
        current_page: page,
        total_pages,
        total_orders,
        per_page,
        has_prev: page > 1,
        has_next: page < total_pages,
    }
}

impl PaginatedOrders {
    /// Page numbers around the current page, with the first and last page
    /// always reachable and gaps marked by [`PageLink::Ellipsis`].
    pub fn page_links(&self) -> Vec<PageLink> {
        page_links(self.current_page, self.total_pages)
    }

    /// Orders on this page per origin, in [`Origin::ALL`] order.
    pub fn count_by_origin(&self) -> Vec<(Origin, usize)> {
        Origin::ALL
            .iter()
            .map(|origin| {
                let n = self.orders.iter().filter(|o| o.origin == *origin).count();
                (*origin, n)
            })
            .collect()
    }

    pub fn prev_page(&self) -> Option<u32> {
        self.has_prev.then(|| self.current_page - 1)
    }

    pub fn next_page(&self) -> Option<u32> {
        self.has_next.then(|| self.current_page + 1)
    }
}

pub fn page_links(current: u32, total_pages: u32) -> Vec<PageLink> {
    let start = current.saturating_sub(PAGE_WINDOW).max(1);
    let end = current.saturating_add(PAGE_WINDOW).min(total_pages);

    let mut links = Vec::new();
    if start > 1 {
        links.push(PageLink::Page {
            number: 1,
            current: false,
        });
        if start > 2 {
            links.push(PageLink::Ellipsis);
        }
    }

    for number in start..=end {
        links.push(PageLink::Page {
            number,
            current: number == current,
        });
    }

    if end < total_pages {
        if end + 1 < total_pages {
            links.push(PageLink::Ellipsis);
        }
        links.push(PageLink::Page {
            number: total_pages,
            current: false,
        });
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn orders(n: usize) -> Vec<UnifiedOrder> {
        (0..n)
            .map(|i| UnifiedOrder {
                id: i.to_string(),
                order_number: format!("#{i}"),
                customer: String::new(),
                order_date: String::new(),
                deliver_on: "N/A".to_string(),
                total: "$0.00".to_string(),
                status: "Processing".to_string(),
                origin: if i % 3 == 0 {
                    Origin::Orderspace
                } else {
                    Origin::WooCommerce
                },
                sort_timestamp: Utc.timestamp_opt(1_700_000_000 - i as i64, 0).unwrap(),
            })
            .collect()
    }

    #[test]
    fn twenty_five_orders_ten_per_page() {
        let all = orders(25);

        let p1 = paginate(&all, 1, 10);
        assert_eq!(p1.orders.len(), 10);
        assert_eq!(p1.total_pages, 3);
        assert!(p1.has_next);
        assert!(!p1.has_prev);
        assert_eq!(p1.orders[0].id, "0");

        let p3 = paginate(&all, 3, 10);
        assert_eq!(p3.orders.len(), 5);
        assert!(!p3.has_next);
        assert!(p3.has_prev);
        assert_eq!(p3.orders[0].id, "20");

        let p4 = paginate(&all, 4, 10);
        assert!(p4.orders.is_empty());
        assert_eq!(p4.total_pages, 3);
        assert_eq!(p4.total_orders, 25);
        assert!(p4.has_prev);
        assert!(!p4.has_next);
    }

    #[test]
    fn empty_collection_has_one_page() {
        let p = paginate(&[], 1, 10);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.total_orders, 0);
        assert!(p.orders.is_empty());
        assert!(!p.has_prev);
        assert!(!p.has_next);
    }

    #[test]
    fn far_out_of_range_page_does_not_overflow() {
        let p = paginate(&orders(3), u32::MAX, 100);
        assert!(p.orders.is_empty());
        assert_eq!(p.total_pages, 1);
    }

    #[test]
    fn prev_next_numbers() {
        let p = paginate(&orders(25), 2, 10);
        assert_eq!(p.prev_page(), Some(1));
        assert_eq!(p.next_page(), Some(3));
        let p = paginate(&orders(25), 1, 10);
        assert_eq!(p.prev_page(), None);
    }

    #[test]
    fn count_by_origin_covers_both_origins() {
        let p = paginate(&orders(6), 1, 10);
        assert_eq!(
            p.count_by_origin(),
            vec![(Origin::WooCommerce, 4), (Origin::Orderspace, 2)]
        );
    }

    fn render(links: &[PageLink]) -> String {
        links
            .iter()
            .map(|l| match l {
                PageLink::Page {
                    number,
                    current: true,
                } => format!("[{number}]"),
                PageLink::Page { number, .. } => number.to_string(),
                PageLink::Ellipsis => "…".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn page_links_single_page() {
        assert_eq!(render(&page_links(1, 1)), "[1]");
    }

    #[test]
    fn page_links_middle_of_many() {
        assert_eq!(render(&page_links(10, 20)), "1 … 8 9 [10] 11 12 … 20");
    }

    #[test]
    fn page_links_near_edges_skip_redundant_ellipsis() {
        assert_eq!(render(&page_links(1, 10)), "[1] 2 3 … 10");
        assert_eq!(render(&page_links(4, 6)), "1 2 3 [4] 5 6");
        assert_eq!(render(&page_links(10, 10)), "1 … 8 9 [10]");
    }
}
