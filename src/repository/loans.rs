//! Loans repository for database operations
//!
//! Borrow and return are single transactions that open with a write, so the
//! store's write lock is held before any eligibility check is evaluated.
//! Any failed check drops the transaction, which rolls every write back.

use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{Loan, LoanBookInfo, LoanDetails, LoanStatusFilter},
        user::UserSummary,
        Pagination,
    },
};

const LOAN_COLUMNS: &str =
    "id, book_id, copy_id, borrower_id, borrowed_at, due_date, returned_at, is_returned";

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.book_id, l.copy_id, l.borrower_id, l.borrowed_at, l.due_date,
           l.returned_at, l.is_returned,
           b.title, b.author, b.category, b.image_url,
           u.username, u.email
    FROM loans l
    LEFT JOIN books b ON b.id = l.book_id
    JOIN users u ON u.id = l.borrower_id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Sqlite>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {} FROM loans WHERE id = ?", LOAN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get a loan with its catalog entry and borrower
    pub async fn get_details(&self, id: i64, now: DateTime<Utc>) -> AppResult<LoanDetails> {
        let row = sqlx::query(&format!("{} WHERE l.id = ?", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;

        Ok(details_from_row(&row, now))
    }

    /// Lend the earliest-donated available copy of `book_id` to `borrower_id`.
    ///
    /// Checks run in this order: catalog entry exists, borrower has no
    /// overdue loan, borrower has no open loan for this entry, a copy was free.
    pub async fn borrow(
        &self,
        book_id: i64,
        borrower_id: i64,
        period_days: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE copies SET is_available = 0
            WHERE id = (
                SELECT id FROM copies
                WHERE book_id = ? AND is_available = 1
                ORDER BY donated_at, id
                LIMIT 1
            )
              AND is_available = 1
            RETURNING id
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let book_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;
        if book_exists == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }

        let overdue: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id = ? AND is_returned = 0 AND due_date < ?",
        )
        .bind(borrower_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        if overdue > 0 {
            return Err(AppError::Ineligible(
                "You have overdue books. Please return them before borrowing new ones.".to_string(),
            ));
        }

        let already: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id = ? AND book_id = ? AND is_returned = 0",
        )
        .bind(borrower_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;
        if already > 0 {
            return Err(AppError::Conflict("You have already borrowed this book".to_string()));
        }

        let copy_id = claimed
            .ok_or_else(|| AppError::Unavailable("No copies available for borrowing".to_string()))?;

        let due_date = now + Duration::days(period_days);
        let id = sqlx::query(
            r#"
            INSERT INTO loans (book_id, copy_id, borrower_id, borrowed_at, due_date, returned_at, is_returned)
            VALUES (?, ?, ?, ?, ?, NULL, 0)
            "#,
        )
        .bind(book_id)
        .bind(copy_id)
        .bind(borrower_id)
        .bind(now)
        .bind(due_date)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        Ok(Loan {
            id,
            book_id: Some(book_id),
            copy_id: Some(copy_id),
            borrower_id,
            borrowed_at: now,
            due_date,
            returned_at: None,
            is_returned: false,
        })
    }

    /// Close an open loan and put its copy back on the shelf.
    ///
    /// `authorize` sees the loan before anything is committed; an error from it
    /// aborts the return. Failures are reported as not found, then the
    /// authorization error, then already returned.
    pub async fn close<F>(&self, loan_id: i64, now: DateTime<Utc>, authorize: F) -> AppResult<Loan>
    where
        F: FnOnce(&Loan) -> AppResult<()>,
    {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            "UPDATE loans SET is_returned = 1, returned_at = ? WHERE id = ? AND is_returned = 0",
        )
        .bind(now)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = ?",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        authorize(&loan)?;

        if closed == 0 {
            return Err(AppError::AlreadyReturned);
        }

        if let Some(copy_id) = loan.copy_id {
            sqlx::query("UPDATE copies SET is_available = 1 WHERE id = ?")
                .bind(copy_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(loan)
    }

    /// Open loans held by a user, oldest first
    pub async fn open_for_borrower(
        &self,
        borrower_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE l.borrower_id = ? AND l.is_returned = 0 ORDER BY l.borrowed_at, l.id",
            DETAILS_SELECT
        ))
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| details_from_row(row, now)).collect())
    }

    /// List loans for administration, newest first
    pub async fn list(
        &self,
        filter: LoanStatusFilter,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let (condition, compares_due_date) = match filter {
            LoanStatusFilter::All => ("1=1", false),
            LoanStatusFilter::Active => ("l.is_returned = 0", false),
            LoanStatusFilter::Returned => ("l.is_returned = 1", false),
            LoanStatusFilter::Overdue => ("l.is_returned = 0 AND l.due_date < ?", true),
        };

        let count_query = format!("SELECT COUNT(*) FROM loans l WHERE {}", condition);
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);
        if compares_due_date {
            count = count.bind(now);
        }
        let total = count.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} WHERE {} ORDER BY l.borrowed_at DESC, l.id DESC LIMIT ? OFFSET ?",
            DETAILS_SELECT, condition
        );
        let mut select = sqlx::query(&select_query);
        if compares_due_date {
            select = select.bind(now);
        }
        let rows = select
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.iter().map(|row| details_from_row(row, now)).collect(), total))
    }

    /// Count all loans ever made
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count open loans
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE is_returned = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count open loans past their due date
    pub async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE is_returned = 0 AND due_date < ?",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

fn details_from_row(row: &SqliteRow, now: DateTime<Utc>) -> LoanDetails {
    let loan = Loan {
        id: row.get("id"),
        book_id: row.get("book_id"),
        copy_id: row.get("copy_id"),
        borrower_id: row.get("borrower_id"),
        borrowed_at: row.get("borrowed_at"),
        due_date: row.get("due_date"),
        returned_at: row.get("returned_at"),
        is_returned: row.get("is_returned"),
    };

    let title: Option<String> = row.get("title");
    let book = match (loan.book_id, title) {
        (Some(id), Some(title)) => Some(LoanBookInfo {
            id,
            title,
            author: row.get::<Option<String>, _>("author").unwrap_or_default(),
            category: row.get("category"),
            image_url: row.get("image_url"),
        }),
        _ => None,
    };

    LoanDetails {
        is_overdue: loan.is_overdue_at(now),
        borrower: UserSummary {
            id: loan.borrower_id,
            username: row.get("username"),
            email: row.get("email"),
        },
        book,
        loan,
    }
}
