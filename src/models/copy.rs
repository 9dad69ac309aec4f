//! Donated copy model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::user::UserSummary;

/// Physical condition reported by the donor.
/// The four usual grades are recognised; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    New,
    Good,
    Fair,
    Poor,
    Other(String),
}

impl Condition {
    pub fn as_str(&self) -> &str {
        match self {
            Condition::New => "New",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::Poor => "Poor",
            Condition::Other(s) => s.as_str(),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Good
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "new" => Condition::New,
            "good" | "" => Condition::Good,
            "fair" => Condition::Fair,
            "poor" => Condition::Poor,
            _ => Condition::Other(s.trim().to_string()),
        }
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Condition::from(s.to_string())
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.as_str().to_string()
    }
}

/// Internal row structure for copy queries
#[derive(Debug, Clone, FromRow)]
pub struct BookCopyRow {
    id: i64,
    book_id: i64,
    donor_id: i64,
    condition: String,
    is_available: bool,
    notes: Option<String>,
    donated_at: DateTime<Utc>,
}

impl From<BookCopyRow> for BookCopy {
    fn from(row: BookCopyRow) -> Self {
        BookCopy {
            id: row.id,
            book_id: row.book_id,
            donor_id: row.donor_id,
            condition: Condition::from(row.condition),
            is_available: row.is_available,
            notes: row.notes,
            donated_at: row.donated_at,
        }
    }
}

/// One physical, donated instance of a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookCopy {
    pub id: i64,
    pub book_id: i64,
    pub donor_id: i64,
    #[schema(value_type = String)]
    pub condition: Condition,
    /// False exactly while an open loan references this copy
    pub is_available: bool,
    pub notes: Option<String>,
    pub donated_at: DateTime<Utc>,
}

/// Book fields shown alongside a donation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DonatedBookInfo {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Donation as listed: the copy with its catalog entry and donor
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Donation {
    /// Human-facing reference, e.g. `DON000042`
    pub donation_ref: String,
    #[serde(flatten)]
    pub copy: BookCopy,
    pub book: DonatedBookInfo,
    pub donor: UserSummary,
}

/// Format the human-facing donation reference for a copy id
pub fn donation_ref(copy_id: i64) -> String {
    format!("DON{:06}", copy_id)
}

/// Donate request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DonateBook {
    #[validate(length(min = 1, max = 200, message = "Title and author are required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Title and author are required"))]
    pub author: String,
    pub isbn: Option<String>,
    /// Also accepted as `genre`
    #[serde(alias = "genre")]
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[schema(value_type = Option<String>)]
    pub condition: Option<Condition>,
    pub notes: Option<String>,
}

/// Update donation request (donor or admin)
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateDonation {
    #[schema(value_type = Option<String>)]
    pub condition: Option<Condition>,
    pub notes: Option<String>,
}

/// Donation counters for one donor
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DonationStats {
    pub total_donated: i64,
    pub available_donated: i64,
    pub currently_borrowed: i64,
}
