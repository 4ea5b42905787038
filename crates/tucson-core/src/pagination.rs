//! # Pagination
//!
//! 1-based page numbers. `limit` defaults to [`DEFAULT_LIMIT`] and is
//! clamped to [`MAX_LIMIT`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Page size used when the caller does not specify one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Requested page, as parsed from a query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<u32>,
    /// Items per page.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PageParams {
    /// Construct explicit parameters.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Effective page number, at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size, within `1..=MAX_LIMIT`.
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Number of items to skip.
    pub fn offset(&self) -> usize {
        (self.page() as usize - 1) * self.limit() as usize
    }

    /// Cut one page out of an already filtered and ordered list.
    pub fn slice<T>(&self, items: Vec<T>) -> (Vec<T>, Pagination) {
        let total = items.len() as u64;
        let page: Vec<T> = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit() as usize)
            .collect();
        (page, Pagination::new(self.page(), self.limit(), total))
    }
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub limit: u32,
    /// Total matching items.
    pub total: u64,
    /// Number of pages, 0 when there are no items.
    pub total_pages: u64,
}

impl Pagination {
    /// Compute metadata for `total` items.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), DEFAULT_LIMIT);

        let params = PageParams::new(0, 1000);
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_LIMIT);
    }

    #[test]
    fn slice_returns_requested_page() {
        let items: Vec<u32> = (0..25).collect();
        let (page, meta) = PageParams::new(3, 10).slice(items);
        assert_eq!(page, vec![20, 21, 22, 23, 24]);
        assert_eq!(meta.total, 25);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn page_past_end_is_empty() {
        let (page, meta) = PageParams::new(9, 10).slice(vec![1, 2, 3]);
        assert!(page.is_empty());
        assert_eq!(meta.total_pages, 1);
    }

    #[test]
    fn empty_total_has_zero_pages() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(1, 10, 11)).unwrap();
        assert_eq!(json["totalPages"], 2);
    }
}
