//! Shared pagination types for API query parameters.
//!
//! List endpoints that can grow without bound (the user directory) page their results with
//! `skip` and `limit`. Filtering and sorting happen before the page is cut, so `total_count`
//! in the response always reflects the full filtered set.

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 100;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 1000;

/// Offset-based pagination parameters.
///
/// The `limit` is clamped to ensure it's always between 1 and [`MAX_LIMIT`].
#[serde_as]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 100, max: 1000)
    #[param(default = 100, minimum = 1, maximum = 1000)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the skip value, defaulting to 0 if not specified.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    /// Defaults to DEFAULT_LIMIT if not specified.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Cut one page out of an already filtered and sorted list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        // Both values are clamped non-negative above
        let skip = self.skip() as usize;
        let limit = self.limit() as usize;
        items.into_iter().skip(skip).take(limit).collect()
    }
}
