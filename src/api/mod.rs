//! API handlers for Pustakalay REST endpoints

pub mod admin;
pub mod auth;
pub mod books;
pub mod donations;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::{FromRequestParts, Json, Path, Query},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{Pagination, Principal},
    AppState,
};

/// JSON body whose parse failures use the API error envelope
pub type ApiJson<T> = WithRejection<Json<T>, AppError>;
/// Path parameters whose parse failures use the API error envelope
pub type ApiPath<T> = WithRejection<Path<T>, AppError>;
/// Query string whose parse failures use the API error envelope
pub type ApiQuery<T> = WithRejection<Query<T>, AppError>;

/// Extractor for the authenticated caller, resolved from the bearer token
/// against the stored user so role changes apply immediately
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Authentication("Invalid authorization header format".to_string())
            })?;

        let principal = state.services.users.resolve_principal(token).await?;
        Ok(AuthenticatedUser(principal))
    }
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always "success"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data,
        }
    }
}

/// Message-only success envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Always "success"
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub items: Vec<T>,
    /// Total number of matching records
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: i64,
    pub per_page: i64,
    /// Total number of pages
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let pages = pagination.pages(total);
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            pages,
            has_next: pagination.page < pages,
            has_prev: pagination.page > 1,
        }
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/change-password", post(auth::change_password))
        // Catalog and lending
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/categories", get(books::list_categories))
        .route("/books/borrowed", get(books::borrowed_books))
        .route("/books/return/:loan_id", post(books::return_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/borrow", post(books::borrow_book))
        // Donations
        .route("/donations", get(donations::list_donations).post(donations::donate_book))
        .route("/donations/mine", get(donations::my_donations))
        .route("/donations/my-donations", get(donations::my_donations))
        .route("/donations/stats", get(donations::donation_stats))
        .route(
            "/donations/:id",
            get(donations::get_donation)
                .put(donations::update_donation)
                .delete(donations::delete_donation),
        )
        // Administration
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/make-admin", post(admin::make_admin))
        .route("/admin/users/:id/remove-admin", post(admin::remove_admin))
        .route("/admin/borrowings", get(admin::list_borrowings))
        .route("/admin/borrowings/:id/force-return", post(admin::force_return))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
