//! Business logic services

pub mod catalog;
pub mod donations;
pub mod loans;
pub mod seed;
pub mod stats;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub donations: donations::DonationsService,
    pub loans: loans::LoansService,
    pub stats: stats::StatsService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            donations: donations::DonationsService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), config.loans.clone()),
            stats: stats::StatsService::new(repository.clone()),
            repository,
        }
    }
}
