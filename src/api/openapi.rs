//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, books, donations, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pustakalay API",
        version = "1.0.0",
        description = "Community book donation and lending REST API"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::get_profile,
        auth::update_profile,
        auth::change_password,
        // Books
        books::list_books,
        books::list_categories,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::borrow_book,
        books::return_book,
        books::borrowed_books,
        // Donations
        donations::donate_book,
        donations::list_donations,
        donations::my_donations,
        donations::donation_stats,
        donations::get_donation,
        donations::update_donation,
        donations::delete_donation,
        // Admin
        admin::dashboard,
        admin::list_users,
        admin::make_admin,
        admin::remove_admin,
        admin::list_borrowings,
        admin::force_return,
    ),
    components(
        schemas(
            // Auth
            auth::AuthPayload,
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::Role,
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            crate::models::user::UpdateProfile,
            crate::models::user::ChangePassword,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::BookDetails,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Donations
            crate::models::copy::BookCopy,
            crate::models::copy::Donation,
            crate::models::copy::DonatedBookInfo,
            crate::models::copy::DonateBook,
            crate::models::copy::UpdateDonation,
            crate::models::copy::DonationStats,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanBookInfo,
            crate::models::loan::LoanStatusFilter,
            // Admin
            crate::services::stats::DashboardStats,
            // Common
            super::MessageResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and profile"),
        (name = "books", description = "Catalog browsing and lending"),
        (name = "donations", description = "Donated copies"),
        (name = "admin", description = "Administration")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
