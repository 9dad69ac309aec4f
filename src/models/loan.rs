//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::user::UserSummary;

/// Loan model from database.
/// `book_id` and `copy_id` become NULL once the referenced rows are deleted;
/// only closed loans can be in that state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub book_id: Option<i64>,
    pub copy_id: Option<i64>,
    pub borrower_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub is_returned: bool,
}

impl Loan {
    /// Open loan whose due date has passed
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_returned && self.due_date < now
    }
}

/// Catalog fields shown alongside a loan
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanBookInfo {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// Loan with full details for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub is_overdue: bool,
    pub book: Option<LoanBookInfo>,
    pub borrower: UserSummary,
}

/// Filter for the admin borrowings listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatusFilter {
    #[default]
    All,
    Active,
    Returned,
    Overdue,
}

/// Admin borrowings query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BorrowingQuery {
    /// all, active, returned or overdue
    pub status: Option<LoanStatusFilter>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
