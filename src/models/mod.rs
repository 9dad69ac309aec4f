//! Data models for Pustakalay

pub mod book;
pub mod copy;
pub mod loan;
pub mod user;

use serde::Deserialize;
use utoipa::IntoParams;

// Re-export commonly used types
pub use book::{Book, BookDetails, BookSummary};
pub use copy::{BookCopy, Condition, Donation, DonationStats};
pub use loan::{Loan, LoanDetails, LoanStatusFilter};
pub use user::{Principal, Role, User, UserSummary};

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page whose offset still fits in an i64
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Plain page/per_page query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-indexed page number (default 1)
    pub page: Option<i64>,
    /// Page size (default 10, max 100)
    pub per_page: Option<i64>,
}

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Total number of pages for `total` rows
    pub fn pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

impl From<&PageQuery> for Pagination {
    fn from(query: &PageQuery) -> Self {
        Pagination::new(query.page, query.per_page)
    }
}
