//! Copy ledger service: donations of physical copies

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        book::{non_blank, BookMetadata},
        copy::{DonateBook, Donation, DonationStats, UpdateDonation},
        Pagination, Principal,
    },
    repository::Repository,
    services::catalog::require_title_and_author,
};

#[derive(Clone)]
pub struct DonationsService {
    repository: Repository,
}

impl DonationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Donate a copy, creating the catalog entry on first donation of a title
    pub async fn donate(&self, donor: &Principal, data: DonateBook) -> AppResult<Donation> {
        data.validate()?;

        let metadata = BookMetadata {
            title: data.title.trim().to_string(),
            author: data.author.trim().to_string(),
            isbn: non_blank(data.isbn),
            category: non_blank(data.category),
            description: non_blank(data.description),
            image_url: non_blank(data.image_url),
        };
        require_title_and_author(&metadata.title, &metadata.author)?;

        let condition = data.condition.unwrap_or_default();
        let notes = non_blank(data.notes);

        let copy_id = self
            .repository
            .copies
            .donate(donor.user_id, &metadata, &condition, notes.as_deref())
            .await?;

        let donation = self.repository.copies.get_donation(copy_id).await?;
        tracing::info!(
            copy_id,
            book_id = donation.book.id,
            donor_id = donor.user_id,
            "Book donated"
        );
        Ok(donation)
    }

    /// All donations, newest first
    pub async fn list(&self, pagination: Pagination) -> AppResult<(Vec<Donation>, i64)> {
        self.repository.copies.list_donations(None, pagination).await
    }

    /// The caller's donations, newest first
    pub async fn list_mine(
        &self,
        donor: &Principal,
        pagination: Pagination,
    ) -> AppResult<(Vec<Donation>, i64)> {
        self.repository
            .copies
            .list_donations(Some(donor.user_id), pagination)
            .await
    }

    /// A single donation, visible to its donor and to admins
    pub async fn get(&self, actor: &Principal, id: i64) -> AppResult<Donation> {
        let donation = self.repository.copies.get_donation(id).await?;
        actor.require_owner_or_admin(donation.copy.donor_id)?;
        Ok(donation)
    }

    /// Update condition and notes (donor or admin)
    pub async fn update(&self, actor: &Principal, id: i64, data: UpdateDonation) -> AppResult<Donation> {
        let copy = self.repository.copies.get_by_id(id).await?;
        actor.require_owner_or_admin(copy.donor_id)?;

        let notes = data.notes.map(|n| n.trim().to_string());
        self.repository
            .copies
            .update(id, data.condition.as_ref(), notes.as_deref())
            .await?;

        tracing::info!(copy_id = id, actor_id = actor.user_id, "Donation updated");
        self.repository.copies.get_donation(id).await
    }

    /// Remove a copy that is not on loan (donor or admin)
    pub async fn delete(&self, actor: &Principal, id: i64) -> AppResult<()> {
        let copy = self.repository.copies.get_by_id(id).await?;
        actor.require_owner_or_admin(copy.donor_id)?;

        self.repository.copies.delete(id).await?;
        tracing::info!(copy_id = id, actor_id = actor.user_id, "Donation deleted");
        Ok(())
    }

    /// Donation counters for the caller
    pub async fn stats(&self, donor: &Principal) -> AppResult<DonationStats> {
        self.repository.copies.stats_for_donor(donor.user_id).await
    }
}
