//! Account registration and login endpoints

use axum::{extract::State, http::StatusCode};

use crate::{
    error::AppResult,
    models::{
        enums::AccountKind,
        user::{AccountInfo, LoginRequest, RegisterRequest},
    },
    AppState,
};

use super::{ApiResponse, AppJson};

/// Register a reader or an administrator
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AccountInfo),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Account exists or no administrator available")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, ApiResponse<AccountInfo>)> {
    let account = state.services.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(account).with_message("Registration successful"),
    ))
}

/// Check account credentials
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = AccountInfo),
        (status = 401, description = "Invalid credentials or disabled account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<ApiResponse<AccountInfo>> {
    let kind = AccountKind::from_admin_flag(request.is_admin);
    let account = state
        .services
        .auth
        .login(kind, &request.email, &request.password)
        .await?;
    Ok(ApiResponse::ok(account).with_message("Login successful"))
}
