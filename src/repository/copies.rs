//! Copy ledger repository: donated copies and their availability

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookMetadata,
        copy::{donation_ref, BookCopy, BookCopyRow, Condition, DonatedBookInfo, Donation, DonationStats},
        user::UserSummary,
        Pagination,
    },
};

const DONATION_SELECT: &str = r#"
    SELECT c.id, c.book_id, c.donor_id, c.condition, c.is_available, c.notes, c.donated_at,
           b.title, b.author, b.isbn, b.category, b.description,
           u.username AS donor_username, u.email AS donor_email
    FROM copies c
    JOIN books b ON b.id = c.book_id
    JOIN users u ON u.id = c.donor_id
"#;

#[derive(Clone)]
pub struct CopiesRepository {
    pool: Pool<Sqlite>,
}

impl CopiesRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Record a donation: find or create the catalog entry by exact
    /// (title, author) and add a new available copy to it.
    /// Returns the new copy ID.
    pub async fn donate(
        &self,
        donor_id: i64,
        book: &BookMetadata,
        condition: &Condition,
        notes: Option<&str>,
    ) -> AppResult<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
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
        .execute(&mut *tx)
        .await?;

        let book_id: i64 = sqlx::query_scalar("SELECT id FROM books WHERE title = ? AND author = ?")
            .bind(&book.title)
            .bind(&book.author)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("ISBN already belongs to another book".to_string())
            })?;

        let copy_id = sqlx::query(
            r#"
            INSERT INTO copies (book_id, donor_id, condition, is_available, notes, donated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(book_id)
        .bind(donor_id)
        .bind(condition.as_str())
        .bind(notes)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        Ok(copy_id)
    }

    /// Available copies of a catalog entry, earliest donation first
    pub async fn list_available(&self, book_id: i64) -> AppResult<Vec<BookCopy>> {
        let rows = sqlx::query_as::<_, BookCopyRow>(
            r#"
            SELECT id, book_id, donor_id, condition, is_available, notes, donated_at
            FROM copies
            WHERE book_id = ? AND is_available = 1
            ORDER BY donated_at, id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BookCopy::from).collect())
    }

    /// Get a single copy
    pub async fn get_by_id(&self, id: i64) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopyRow>(
            r#"
            SELECT id, book_id, donor_id, condition, is_available, notes, donated_at
            FROM copies WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(BookCopy::from)
        .ok_or_else(|| AppError::NotFound(format!("Donation with id {} not found", id)))
    }

    /// Get a donation with its catalog entry and donor
    pub async fn get_donation(&self, id: i64) -> AppResult<Donation> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", DONATION_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Donation with id {} not found", id)))?;

        Ok(donation_from_row(&row))
    }

    /// List donations, newest first, optionally restricted to one donor
    pub async fn list_donations(
        &self,
        donor_id: Option<i64>,
        pagination: Pagination,
    ) -> AppResult<(Vec<Donation>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM copies WHERE (? IS NULL OR donor_id = ?)",
        )
        .bind(donor_id)
        .bind(donor_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE (? IS NULL OR c.donor_id = ?) ORDER BY c.donated_at DESC, c.id DESC LIMIT ? OFFSET ?",
            DONATION_SELECT
        ))
        .bind(donor_id)
        .bind(donor_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(donation_from_row).collect(), total))
    }

    /// Update donor-editable fields; availability is not touched here
    pub async fn update(
        &self,
        id: i64,
        condition: Option<&Condition>,
        notes: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE copies SET
                condition = COALESCE(?, condition),
                notes = COALESCE(?, notes)
            WHERE id = ?
            "#,
        )
        .bind(condition.map(Condition::as_str))
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Donation with id {} not found", id)));
        }
        Ok(())
    }

    /// Delete a copy unless it is on loan. Closed loans keep their
    /// history with the copy reference cleared.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM copies
            WHERE id = ?
              AND NOT EXISTS (SELECT 1 FROM loans WHERE copy_id = ? AND is_returned = 0)
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM copies WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists == 0 {
                AppError::NotFound(format!("Donation with id {} not found", id))
            } else {
                AppError::Conflict("Cannot delete a donation that is currently borrowed".to_string())
            });
        }

        tx.commit().await?;
        Ok(())
    }

    /// Donation counters for one donor
    pub async fn stats_for_donor(&self, donor_id: i64) -> AppResult<DonationStats> {
        let (total_donated, available_donated): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_available = 1 THEN 1 ELSE 0 END), 0)
            FROM copies WHERE donor_id = ?
            "#,
        )
        .bind(donor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(DonationStats {
            total_donated,
            available_donated,
            currently_borrowed: total_donated - available_donated,
        })
    }

    /// Count all copies
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM copies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count copies currently flagged unavailable
    pub async fn count_unavailable(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM copies WHERE is_available = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn donation_from_row(row: &SqliteRow) -> Donation {
    let id: i64 = row.get("id");
    let book_id: i64 = row.get("book_id");
    let donor_id: i64 = row.get("donor_id");
    let condition: String = row.get("condition");

    Donation {
        donation_ref: donation_ref(id),
        copy: BookCopy {
            id,
            book_id,
            donor_id,
            condition: Condition::from(condition),
            is_available: row.get("is_available"),
            notes: row.get("notes"),
            donated_at: row.get("donated_at"),
        },
        book: DonatedBookInfo {
            id: book_id,
            title: row.get("title"),
            author: row.get("author"),
            isbn: row.get("isbn"),
            category: row.get("category"),
            description: row.get("description"),
        },
        donor: UserSummary {
            id: donor_id,
            username: row.get("donor_username"),
            email: row.get("donor_email"),
        },
    }
}
