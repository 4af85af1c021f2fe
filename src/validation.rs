use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ListQuery, TaskStatus};

// =============================================================================
// Validation Constants
// =============================================================================

/// Upper bound on `limit` for paginated listings.
pub const MAX_PAGE_SIZE: usize = 100;

/// Validate a path identifier.
///
/// Identifiers are hyphenated UUIDs; anything else is a client error, which
/// keeps malformed ids distinct from ids that simply do not exist.
pub fn parse_id(raw: &str, resource_type: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid {resource_type} ID")))
}

/// Require a non-blank text field.
///
/// The value is stored exactly as sent; only the emptiness check ignores
/// surrounding whitespace.
pub fn require_text(value: Option<String>, message: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(message.to_string())),
    }
}

/// Parse an optional status string. Absent means `None`; any present value,
/// including the empty string, must name a known status.
pub fn parse_status(raw: Option<&str>) -> AppResult<Option<TaskStatus>> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: crate::models::InvalidTaskStatus| AppError::BadRequest(e.to_string())),
    }
}

/// Page request derived from `?page=P&limit=L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: usize,
    /// Items per page, capped at [`MAX_PAGE_SIZE`]
    pub limit: usize,
}

impl Pagination {
    /// Extract pagination from a query.
    ///
    /// Returns `None` unless both `page` and `limit` are present positive
    /// integers, in which case the caller serves the plain listing.
    pub fn from_query(query: &ListQuery) -> Option<Self> {
        let page = parse_positive(query.page.as_deref()?)?;
        let limit = parse_positive(query.limit.as_deref()?)?;

        Some(Self {
            page,
            limit: limit.min(MAX_PAGE_SIZE),
        })
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}
