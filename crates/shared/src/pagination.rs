//! Offset pagination for list endpoints.
//!
//! Every list endpoint takes 1-based `page` and `limit` (1..=100) query
//! parameters and answers with a `{count, results}` envelope, where `count`
//! is the total number of matches before slicing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default page size when `limit` is omitted.
pub const DEFAULT_LIMIT: i64 = 10;

/// Upper bound on `limit`.
pub const MAX_LIMIT: i64 = 100;

/// Error type for pagination parameter resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page must be a positive integer")]
    InvalidPage,
    #[error("limit must be between 1 and {MAX_LIMIT}")]
    InvalidLimit,
}

/// Raw pagination query parameters as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Resolved pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub limit: i64,
}

impl Page {
    /// Resolve raw query parameters into a validated window.
    pub fn resolve(query: &PageQuery) -> Result<Self, PageError> {
        let number = query.page.unwrap_or(1);
        if number <= 0 {
            return Err(PageError::InvalidPage);
        }
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        if limit <= 0 || limit > MAX_LIMIT {
            return Err(PageError::InvalidLimit);
        }
        Ok(Self { number, limit })
    }

    /// Row offset for SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.limit
    }
}

/// List envelope: total match count plus the requested slice.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(count: i64, results: Vec<T>) -> Self {
        Self { count, results }
    }
}
