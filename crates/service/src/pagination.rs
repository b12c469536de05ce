//! Page windows for search results.

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    /// 1-based page index
    pub page: u32,
    /// items per page
    pub per_page: u32,
}

/// Bounds applied when a caller asks for a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLimits {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for PageLimits {
    fn default() -> Self { Self { default_per_page: 20, max_per_page: 100 } }
}

impl Pagination {
    /// Returns `(0-based page index, per_page)` clamped to `limits`.
    pub fn normalize_with(self, limits: PageLimits) -> (u64, u64) {
        let page = if self.page == 0 { 1 } else { self.page };
        let per_page = self.per_page.clamp(1, limits.max_per_page.max(1));
        ((page - 1) as u64, per_page as u64)
    }

    /// Build from optional query values; `None` when neither was supplied.
    pub fn requested(page: Option<u32>, per_page: Option<u32>, limits: PageLimits) -> Option<Self> {
        if page.is_none() && per_page.is_none() {
            return None;
        }
        Some(Self { page: page.unwrap_or(1), per_page: per_page.unwrap_or(limits.default_per_page) })
    }
}

/// Page metadata returned alongside search results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl PageInfo {
    pub fn new(page_idx: u64, limit: u64, total: u64) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self { page: page_idx + 1, limit, total, pages }
    }
}
