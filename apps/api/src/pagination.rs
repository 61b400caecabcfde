use serde::Serialize;

use crate::errors::AppError;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 100;

/// Validated `skip`/`limit` pair for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub fn resolve(skip: Option<i64>, limit: Option<i64>) -> Result<Self, AppError> {
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if skip < 0 {
            return Err(AppError::Validation("skip must be >= 0".into()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Page { skip, limit })
    }
}

/// Envelope for paginated list responses.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            skip: page.skip,
            limit: page.limit,
        }
    }
}
