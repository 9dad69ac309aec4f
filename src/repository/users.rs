//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{Role, User, UserRow},
        Pagination,
    },
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, phone, address, role, created_at";

/// Fields written on registration
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub role: Role,
}

/// Profile fields to overwrite; `None` leaves the column untouched
#[derive(Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Sqlite>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get user by (lowercased) email when the login contains `@`, else by exact username
    pub async fn find_by_login(&self, username_or_email: &str) -> AppResult<Option<User>> {
        let (column, value) = if username_or_email.contains('@') {
            ("email", username_or_email.to_lowercase())
        } else {
            ("username", username_or_email.to_string())
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} = ?",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Check if username already exists
    pub async fn username_exists(&self, username: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Create a new user
    pub async fn create(&self, user: NewUser<'_>) -> AppResult<User> {
        let id = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, phone, address, role, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.phone)
        .bind(user.address)
        .bind(user.role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_by_id(id).await
    }

    /// Update profile fields
    pub async fn update_profile(&self, id: i64, changes: &ProfileChanges) -> AppResult<User> {
        sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE(?, username),
                email = COALESCE(?, email),
                phone = COALESCE(?, phone),
                address = COALESCE(?, address),
                password_hash = COALESCE(?, password_hash)
            WHERE id = ?
            "#,
        )
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(&changes.address)
        .bind(&changes.password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_by_id(id).await
    }

    /// Replace the stored password hash
    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Change a user's role
    pub async fn set_role(&self, id: i64, role: Role) -> AppResult<User> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        self.get_by_id(id).await
    }

    /// List users with pagination
    pub async fn list(&self, pagination: Pagination) -> AppResult<(Vec<User>, i64)> {
        let total = self.count().await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    /// Count users
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
