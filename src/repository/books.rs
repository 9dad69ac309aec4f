//! Catalog repository for database operations

use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookMetadata, BookQuery, BookSummary, UpdateBook},
        Pagination,
    },
};

const SUMMARY_SELECT: &str = r#"
    SELECT b.id, b.title, b.author, b.isbn, b.category, b.description, b.image_url, b.created_at,
           (SELECT COUNT(*) FROM copies c WHERE c.book_id = b.id AND c.is_available = 1) AS available_copies,
           (SELECT COUNT(*) FROM copies c WHERE c.book_id = b.id) AS total_copies
    FROM books b
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Sqlite>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a catalog entry by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, isbn, category, description, image_url, created_at
            FROM books WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get a catalog entry with its copy counts
    pub async fn get_summary(&self, id: i64) -> AppResult<BookSummary> {
        sqlx::query_as::<_, BookSummary>(&format!("{} WHERE b.id = ?", SUMMARY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search the catalog with pagination
    pub async fn search(
        &self,
        query: &BookQuery,
        pagination: Pagination,
    ) -> AppResult<(Vec<BookSummary>, i64)> {
        let mut conditions = vec!["1=1".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push(
                "(LOWER(b.title) LIKE LOWER(?) ESCAPE '\\' OR LOWER(b.author) LIKE LOWER(?) ESCAPE '\\' \
                 OR LOWER(COALESCE(b.isbn, '')) LIKE LOWER(?) ESCAPE '\\')"
                    .to_string(),
            );
            let pattern = like_pattern(search);
            params.extend(std::iter::repeat(pattern).take(3));
        }

        if let Some(category) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("LOWER(COALESCE(b.category, '')) LIKE LOWER(?) ESCAPE '\\'".to_string());
            params.push(like_pattern(category));
        }

        if query.available_only.unwrap_or(false) {
            conditions.push(
                "EXISTS (SELECT 1 FROM copies c WHERE c.book_id = b.id AND c.is_available = 1)"
                    .to_string(),
            );
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM books b WHERE {}", where_clause);
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count = count.bind(param);
        }
        let total = count.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} WHERE {} ORDER BY b.id LIMIT ? OFFSET ?",
            SUMMARY_SELECT, where_clause
        );
        let mut select = sqlx::query_as::<_, BookSummary>(&select_query);
        for param in &params {
            select = select.bind(param);
        }
        let books = select
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Distinct non-empty categories, sorted
    pub async fn categories(&self) -> AppResult<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT category FROM books
            WHERE category IS NOT NULL AND TRIM(category) != ''
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Create a catalog entry; an existing (title, author) pair or ISBN is a conflict
    pub async fn create(&self, book: &BookMetadata) -> AppResult<Book> {
        let result = sqlx::query(
            r#"
            INSERT INTO books (title, author, isbn, category, description, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(&book.description)
        .bind(&book.image_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Book '{}' by {} or its ISBN already exists",
                book.title, book.author
            )));
        }

        self.get_by_id(result.last_insert_rowid()).await
    }

    /// Update catalog metadata; absent fields are left untouched
    pub async fn update(&self, id: i64, changes: &UpdateBook) -> AppResult<Book> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                title = COALESCE(?, title),
                author = COALESCE(?, author),
                isbn = COALESCE(?, isbn),
                category = COALESCE(?, category),
                description = COALESCE(?, description),
                image_url = COALESCE(?, image_url)
            WHERE id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(&changes.isbn)
        .bind(&changes.category)
        .bind(&changes.description)
        .bind(&changes.image_url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        self.get_by_id(id).await
    }

    /// Delete a catalog entry and its copies unless one of them is on loan
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM books
            WHERE id = ?
              AND NOT EXISTS (SELECT 1 FROM loans WHERE book_id = ? AND is_returned = 0)
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists == 0 {
                AppError::NotFound(format!("Book with id {} not found", id))
            } else {
                AppError::Conflict("Cannot delete book with active borrowings".to_string())
            });
        }

        tx.commit().await?;
        Ok(())
    }

    /// Count catalog entries
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Substring pattern with LIKE wildcards taken literally; case folding happens in SQL
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
