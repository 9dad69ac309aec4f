//! Pustakalay community library server
//!
//! A REST JSON API where members donate physical books, browse the
//! resulting catalog, and borrow and return copies under a fixed loan period.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Wire repository and services around an open pool
    pub fn new(config: AppConfig, pool: sqlx::SqlitePool) -> Self {
        let repository = repository::Repository::new(pool);
        let services = services::Services::new(repository, &config);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
