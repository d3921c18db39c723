//! Reader-facing borrow endpoints

use axum::{extract::State, http::StatusCode};

use crate::{
    error::AppResult,
    models::{
        application::{ApplicationListEntry, ApplicationView, ApplyRequest},
        loan::{UserListQuery, UserLoanEntry},
    },
    AppState,
};

use super::{ApiResponse, AppJson, AppQuery};

/// Ask for approval to borrow a book
#[utoipa::path(
    post,
    path = "/api/userborrow/apply",
    tag = "userborrow",
    request_body = ApplyRequest,
    responses(
        (status = 201, description = "Application submitted", body = ApplicationView),
        (status = 400, description = "Missing book id or user account"),
        (status = 401, description = "Password check failed"),
        (status = 404, description = "Book, user or admin not found"),
        (status = 409, description = "Duplicate application or book on loan")
    )
)]
pub async fn apply(
    State(state): State<AppState>,
    AppJson(request): AppJson<ApplyRequest>,
) -> AppResult<(StatusCode, ApiResponse<ApplicationView>)> {
    let application = state.services.borrows.apply_to_borrow(request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(application.view()).with_message("Application submitted"),
    ))
}

/// A user's own applications
#[utoipa::path(
    get,
    path = "/api/userborrow/applications",
    tag = "userborrow",
    params(UserListQuery),
    responses(
        (status = 200, description = "Applications, newest first", body = Vec<ApplicationListEntry>),
        (status = 400, description = "Missing user account")
    )
)]
pub async fn my_applications(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<ApiResponse<Vec<ApplicationListEntry>>> {
    let page = state.services.borrows.list_user_applications(&query).await?;
    Ok(page.into())
}

/// A user's full loan history, overdue loans first
#[utoipa::path(
    get,
    path = "/api/userborrow/borrowed",
    tag = "userborrow",
    params(UserListQuery),
    responses(
        (status = 200, description = "Loan history", body = Vec<UserLoanEntry>),
        (status = 400, description = "Missing user account")
    )
)]
pub async fn loan_history(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<ApiResponse<Vec<UserLoanEntry>>> {
    let page = state.services.borrows.list_user_history(&query).await?;
    Ok(page.into())
}
