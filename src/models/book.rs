//! Catalog entry model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::copy::BookCopy;

/// Catalog entry (a distinct title/author pair)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry with copy counts, as listed
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub book: Book,
    pub available_copies: i64,
    pub total_copies: i64,
}

/// Catalog entry with the copies that can currently be borrowed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub summary: BookSummary,
    pub available_copies_detail: Vec<BookCopy>,
}

/// Catalog query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Substring of title, author or ISBN
    pub search: Option<String>,
    /// Substring of the category
    pub category: Option<String>,
    /// Only entries with at least one available copy
    pub available_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Admin catalog creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author is required"))]
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Admin catalog update request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Metadata used to look up or create a catalog entry
#[derive(Debug, Clone, Default)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Trim a free-text field, mapping blank input to `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<CreateBook> for BookMetadata {
    fn from(book: CreateBook) -> Self {
        BookMetadata {
            title: book.title.trim().to_string(),
            author: book.author.trim().to_string(),
            isbn: non_blank(book.isbn),
            category: non_blank(book.category),
            description: non_blank(book.description),
            image_url: non_blank(book.image_url),
        }
    }
}
