//! Data models shared across database access and API handlers.

use serde::{Deserialize, Serialize};

/// Page navigation metadata returned alongside list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    /// `ceil(total / per_page)`; zero when there are no records.
    pub total_pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
}

impl Pagination {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total = total.max(0);
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total_pages = total / per_page + i64::from(total % per_page != 0);
        let has_prev = page > 1;
        let has_next = page < total_pages;
        Self {
            page,
            per_page,
            total,
            total_pages,
            has_prev,
            has_next,
            prev_page: has_prev.then(|| page - 1),
            next_page: has_next.then(|| page + 1),
        }
    }

    /// Row offset of the first record on this page, saturating for page numbers far past the end.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

pub mod audit_log;
pub mod module;
pub mod role;
pub mod settings;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_last_partial_page() {
        let p = Pagination::new(47, 3, 20);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_prev);
        assert!(!p.has_next);
        assert_eq!(p.prev_page, Some(2));
        assert_eq!(p.next_page, None);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn pagination_first_page_of_many() {
        let p = Pagination::new(100, 1, 20);
        assert_eq!(p.total_pages, 5);
        assert!(!p.has_prev);
        assert!(p.has_next);
        assert_eq!(p.next_page, Some(2));
    }

    #[test]
    fn pagination_empty_result() {
        let p = Pagination::new(0, 1, 20);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_prev);
        assert!(!p.has_next);
    }

    #[test]
    fn pagination_huge_page_saturates_offset() {
        let p = Pagination::new(3, i64::MAX, 20);
        assert_eq!(p.offset(), i64::MAX);
        assert_eq!(p.total_pages, 1);
        assert!(p.has_prev);
        assert!(!p.has_next);
        assert_eq!(p.next_page, None);
    }

    #[test]
    fn pagination_exact_multiple() {
        let p = Pagination::new(40, 2, 20);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_next);
    }
}
