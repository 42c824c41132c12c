//! Pagination helpers shared by the list endpoints.

use std::borrow::Cow;

use folio_db::Window;
use folio_http::validation::rules;
use serde::{Deserialize, Serialize};
use validator::ValidationError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Missing values fall back to page 1 of 10. Zero is raised to 1, so the
    /// offset is never negative.
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).max(1),
        }
    }

    pub fn window(&self) -> Window {
        Window {
            offset: (self.page - 1).saturating_mul(self.limit),
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            data,
            pagination: Pagination {
                page: request.page,
                limit: request.limit,
                total_pages: total_items.div_ceil(request.limit),
                total_items,
            },
        }
    }
}

/// Parse an already validated positive integer query value.
pub fn parse_positive(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Turn a rule outcome into a `validator` result carrying `message`.
pub fn check(valid: bool, message: &'static str) -> Result<(), ValidationError> {
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid").with_message(Cow::Borrowed(message)))
    }
}

pub fn validate_page(value: &str) -> Result<(), ValidationError> {
    check(rules::is_positive_integer(value), "page must be a positive integer")
}

pub fn validate_limit(value: &str) -> Result<(), ValidationError> {
    check(rules::is_positive_integer(value), "limit must be a positive integer")
}
