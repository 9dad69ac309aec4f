//! Administration endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::{
        loan::{BorrowingQuery, Loan, LoanDetails},
        PageQuery, Pagination, Role, User,
    },
    services::stats::DashboardStats,
    AppState,
};

use super::{ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, Page};

/// Aggregate counters
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let stats = state.services.stats.dashboard(&principal).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// List users
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Users page", body = Page<User>),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Query(query), _): ApiQuery<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<User>>>> {
    let pagination = Pagination::from(&query);
    let (users, total) = state.services.users.list(&principal, pagination).await?;
    Ok(Json(ApiResponse::ok(Page::new(users, total, pagination))))
}

/// Grant admin privileges
#[utoipa::path(
    post,
    path = "/admin/users/{id}/make-admin",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User promoted", body = User),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn make_admin(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.services.users.set_role(&principal, id, Role::Admin).await?;
    let message = format!("{} is now an admin", user.username);
    Ok(Json(ApiResponse::with_message(message, user)))
}

/// Revoke admin privileges
#[utoipa::path(
    post,
    path = "/admin/users/{id}/remove-admin",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User demoted", body = User),
        (status = 400, description = "Cannot demote yourself", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_admin(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.services.users.set_role(&principal, id, Role::User).await?;
    let message = format!("Admin privileges removed from {}", user.username);
    Ok(Json(ApiResponse::with_message(message, user)))
}

/// List loans, filtered by status
#[utoipa::path(
    get,
    path = "/admin/borrowings",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(BorrowingQuery),
    responses(
        (status = 200, description = "Loans page", body = Page<LoanDetails>),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_borrowings(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Query(query), _): ApiQuery<BorrowingQuery>,
) -> AppResult<Json<ApiResponse<Page<LoanDetails>>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let (loans, total) = state
        .services
        .loans
        .list(&principal, query.status.unwrap_or_default(), pagination)
        .await?;
    Ok(Json(ApiResponse::ok(Page::new(loans, total, pagination))))
}

/// Close a loan on behalf of its borrower
#[utoipa::path(
    post,
    path = "/admin/borrowings/{id}/force-return",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan closed", body = Loan),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn force_return(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<ApiResponse<Loan>>> {
    let loan = state.services.loans.force_return(&principal, id).await?;
    Ok(Json(ApiResponse::with_message("Book force-returned successfully", loan)))
}
