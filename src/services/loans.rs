//! Loans service: the borrow/return lifecycle

use chrono::Utc;

use crate::{
    config::LoansConfig,
    error::AppResult,
    models::{
        loan::{Loan, LoanDetails, LoanStatusFilter},
        Pagination, Principal,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    /// Borrow one available copy of a catalog entry
    pub async fn borrow(&self, borrower: &Principal, book_id: i64) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let loan = self
            .repository
            .loans
            .borrow(book_id, borrower.user_id, self.config.period_days, now)
            .await?;

        tracing::info!(
            loan_id = loan.id,
            book_id,
            copy_id = ?loan.copy_id,
            borrower_id = borrower.user_id,
            due_date = %loan.due_date,
            "Book borrowed"
        );

        self.repository.loans.get_details(loan.id, now).await
    }

    /// Return a loan; allowed for its borrower and for admins
    pub async fn return_loan(&self, requester: &Principal, loan_id: i64) -> AppResult<LoanDetails> {
        let loan = self
            .repository
            .loans
            .close(loan_id, Utc::now(), |loan| {
                requester.require_owner_or_admin(loan.borrower_id)
            })
            .await?;

        tracing::info!(
            loan_id,
            copy_id = ?loan.copy_id,
            requester_id = requester.user_id,
            "Book returned"
        );

        self.repository.loans.get_details(loan_id, Utc::now()).await
    }

    /// Close any loan on behalf of its borrower (admin)
    pub async fn force_return(&self, admin: &Principal, loan_id: i64) -> AppResult<Loan> {
        admin.require_admin()?;

        let loan = self
            .repository
            .loans
            .close(loan_id, Utc::now(), |_| Ok(()))
            .await?;

        tracing::info!(
            loan_id,
            borrower_id = loan.borrower_id,
            admin_id = admin.user_id,
            "Loan force-returned"
        );
        Ok(loan)
    }

    /// The caller's open loans
    pub async fn borrowed(&self, borrower: &Principal) -> AppResult<Vec<LoanDetails>> {
        self.repository
            .loans
            .open_for_borrower(borrower.user_id, Utc::now())
            .await
    }

    /// Loans across all users, filtered by status (admin)
    pub async fn list(
        &self,
        actor: &Principal,
        status: LoanStatusFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        actor.require_admin()?;
        self.repository
            .loans
            .list(status, pagination, Utc::now())
            .await
    }
}
