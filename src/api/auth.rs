//! Registration, login and profile endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{ChangePassword, LoginRequest, RegisterUser, UpdateProfile, User},
    AppState,
};

use super::{ApiJson, ApiResponse, AuthenticatedUser, MessageResponse};

/// Token issued on registration and login
#[derive(Serialize, ToSchema)]
pub struct AuthPayload {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: User,
}

fn auth_payload(state: &AppState, access_token: String, user: User) -> AuthPayload {
    AuthPayload {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.services.users.token_ttl_seconds(),
        user,
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User registered", body = AuthPayload),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Username or email already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(data), _): ApiJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    let (token, user) = state.services.users.register(data).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            auth_payload(&state, token, user),
        )),
    ))
}

/// Authenticate with username (or email) and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthPayload),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): ApiJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthPayload>>> {
    let (token, user) = state
        .services
        .users
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        auth_payload(&state, token, user),
    )))
}

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.services.users.get_by_id(principal.user_id).await?;
    Ok(Json(ApiResponse::ok(user)))
}

/// Update the caller's profile
#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Username or email already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Json(data), _): ApiJson<UpdateProfile>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state
        .services
        .users
        .update_profile(principal.user_id, data)
        .await?;
    Ok(Json(ApiResponse::with_message("Profile updated successfully", user)))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password is incorrect", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Json(data), _): ApiJson<ChangePassword>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .users
        .change_password(principal.user_id, data)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
