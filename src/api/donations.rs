//! Donation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::{
        copy::{DonateBook, Donation, DonationStats, UpdateDonation},
        PageQuery, Pagination,
    },
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, MessageResponse, Page};

/// Donate a physical copy
#[utoipa::path(
    post,
    path = "/donations",
    tag = "donations",
    security(("bearer_auth" = [])),
    request_body = DonateBook,
    responses(
        (status = 201, description = "Donation recorded", body = Donation),
        (status = 400, description = "Title and author are required", body = crate::error::ErrorResponse)
    )
)]
pub async fn donate_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Json(data), _): ApiJson<DonateBook>,
) -> AppResult<(StatusCode, Json<ApiResponse<Donation>>)> {
    let donation = state.services.donations.donate(&principal, data).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Thank you for your donation!",
            donation,
        )),
    ))
}

/// List all donations
#[utoipa::path(
    get,
    path = "/donations",
    tag = "donations",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Donations page", body = Page<Donation>)
    )
)]
pub async fn list_donations(
    State(state): State<AppState>,
    AuthenticatedUser(_principal): AuthenticatedUser,
    WithRejection(Query(query), _): ApiQuery<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<Donation>>>> {
    let pagination = Pagination::from(&query);
    let (donations, total) = state.services.donations.list(pagination).await?;
    Ok(Json(ApiResponse::ok(Page::new(donations, total, pagination))))
}

/// List the caller's donations
#[utoipa::path(
    get,
    path = "/donations/mine",
    tag = "donations",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Donations page", body = Page<Donation>)
    )
)]
pub async fn my_donations(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Query(query), _): ApiQuery<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<Donation>>>> {
    let pagination = Pagination::from(&query);
    let (donations, total) = state
        .services
        .donations
        .list_mine(&principal, pagination)
        .await?;
    Ok(Json(ApiResponse::ok(Page::new(donations, total, pagination))))
}

/// Donation counters for the caller
#[utoipa::path(
    get,
    path = "/donations/stats",
    tag = "donations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Donation counters", body = DonationStats)
    )
)]
pub async fn donation_stats(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<DonationStats>>> {
    let stats = state.services.donations.stats(&principal).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// Get a donation (donor or admin)
#[utoipa::path(
    get,
    path = "/donations/{id}",
    tag = "donations",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Donation (copy) ID")),
    responses(
        (status = 200, description = "Donation", body = Donation),
        (status = 403, description = "Not the donor", body = crate::error::ErrorResponse),
        (status = 404, description = "Donation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_donation(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<ApiResponse<Donation>>> {
    let donation = state.services.donations.get(&principal, id).await?;
    Ok(Json(ApiResponse::ok(donation)))
}

/// Update condition and notes of a donation (donor or admin)
#[utoipa::path(
    put,
    path = "/donations/{id}",
    tag = "donations",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Donation (copy) ID")),
    request_body = UpdateDonation,
    responses(
        (status = 200, description = "Donation updated", body = Donation),
        (status = 403, description = "Not the donor", body = crate::error::ErrorResponse),
        (status = 404, description = "Donation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_donation(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
    WithRejection(Json(data), _): ApiJson<UpdateDonation>,
) -> AppResult<Json<ApiResponse<Donation>>> {
    let donation = state.services.donations.update(&principal, id, data).await?;
    Ok(Json(ApiResponse::with_message(
        "Donation updated successfully",
        donation,
    )))
}

/// Delete a donation that is not on loan (donor or admin)
#[utoipa::path(
    delete,
    path = "/donations/{id}",
    tag = "donations",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Donation (copy) ID")),
    responses(
        (status = 200, description = "Donation deleted", body = MessageResponse),
        (status = 403, description = "Not the donor", body = crate::error::ErrorResponse),
        (status = 409, description = "Copy is currently borrowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_donation(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.services.donations.delete(&principal, id).await?;
    Ok(Json(MessageResponse::new("Donation deleted successfully")))
}
