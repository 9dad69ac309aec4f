//! Statistics service

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::Principal, repository::Repository};

/// Admin dashboard counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    /// Catalog entries
    pub total_books: i64,
    /// Donated copies
    pub total_donations: i64,
    /// Loans ever made
    pub total_borrowings: i64,
    /// Open loans
    pub active_borrowings: i64,
    /// Open loans past their due date
    pub overdue_borrowings: i64,
    /// Copies flagged unavailable; always equal to `active_borrowings`
    pub unavailable_copies: i64,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Aggregate counters for the admin dashboard
    pub async fn dashboard(&self, actor: &Principal) -> AppResult<DashboardStats> {
        actor.require_admin()?;

        let repo = &self.repository;
        Ok(DashboardStats {
            total_users: repo.users.count().await?,
            total_books: repo.books.count().await?,
            total_donations: repo.copies.count().await?,
            total_borrowings: repo.loans.count().await?,
            active_borrowings: repo.loans.count_active().await?,
            overdue_borrowings: repo.loans.count_overdue(Utc::now()).await?,
            unavailable_copies: repo.copies.count_unavailable().await?,
        })
    }
}
