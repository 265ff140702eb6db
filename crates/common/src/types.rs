//! Common data types for OpenClass services.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Maximum page size for list endpoints.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Pagination query parameters shared by list endpoints.
///
/// Pages are 1-based. Out-of-range values are clamped rather than
/// rejected so dashboards never 400 on a stale page number.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    /// Requested page number (1-based).
    pub page: Option<i64>,

    /// Requested page size.
    pub limit: Option<i64>,
}

impl PageParams {
    /// Resolve to a concrete (page, limit) pair within bounds.
    #[must_use]
    pub fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }

    /// SQL OFFSET for the resolved page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        let (page, limit) = self.resolve();
        (page - 1).saturating_mul(limit)
    }
}

/// Page metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Current page number (1-based).
    pub page: i64,

    /// Page size used for this result.
    pub limit: i64,

    /// Total matching items across all pages.
    pub total: i64,

    /// Total number of pages.
    pub total_pages: i64,
}

impl PageMeta {
    /// Build page metadata from resolved params and a total count.
    #[must_use]
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// A populated `{id, name}` reference to a directory entity.
///
/// Used wherever a response embeds an instructor, stage, or subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSummary {
    /// Entity id.
    pub id: Uuid,

    /// Display name.
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults() {
        let params = PageParams {
            page: None,
            limit: None,
        };
        assert_eq!(params.resolve(), (1, DEFAULT_PAGE_LIMIT));
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_page_params_clamping() {
        let params = PageParams {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(params.resolve(), (1, MAX_PAGE_LIMIT));

        let params = PageParams {
            page: Some(-3),
            limit: Some(0),
        };
        assert_eq!(params.resolve(), (1, 1));
    }

    #[test]
    fn test_page_params_offset() {
        let params = PageParams {
            page: Some(3),
            limit: Some(25),
        };
        assert_eq!(params.offset(), 50);
    }

    #[test]
    fn test_page_meta_rounds_up() {
        let meta = PageMeta::new(1, 20, 41);
        assert_eq!(meta.total_pages, 3);

        let meta = PageMeta::new(1, 20, 40);
        assert_eq!(meta.total_pages, 2);
    }

    #[test]
    fn test_page_meta_empty() {
        let meta = PageMeta::new(1, 20, 0);
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn test_page_meta_serializes_camel_case() {
        let meta = PageMeta::new(2, 20, 45);
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"totalPages\":3"));
        assert!(json.contains("\"page\":2"));
    }
}
