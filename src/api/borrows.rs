//! Loan desk endpoints: lending, returns, records and application review

use axum::{extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        application::{AdminApplicationsQuery, ApplicationListEntry, ProcessRequest, ProcessResponse},
        book::{AvailableBooksQuery, Book},
        loan::{BorrowRecordView, LoanRequest, RecordListEntry, RecordListQuery, UserListQuery, UserLoanEntry},
    },
    AppState,
};

use super::{ApiResponse, AppJson, AppPath, AppQuery};

/// Lend a book to a user
#[utoipa::path(
    post,
    path = "/api/borrow",
    tag = "borrow",
    request_body = LoanRequest,
    responses(
        (status = 201, description = "Book lent", body = BorrowRecordView),
        (status = 400, description = "Missing user account or book id"),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "Book already on loan")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoanRequest>,
) -> AppResult<(StatusCode, ApiResponse<BorrowRecordView>)> {
    let record = state
        .services
        .borrows
        .borrow_book(&request.user_account, &request.book_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(record.view(Utc::now())).with_message("Book borrowed successfully"),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/api/borrow/return",
    tag = "borrow",
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Book returned", body = BorrowRecordView),
        (status = 400, description = "Missing user account or book id"),
        (status = 404, description = "No active loan for this user and book")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoanRequest>,
) -> AppResult<ApiResponse<BorrowRecordView>> {
    let record = state
        .services
        .borrows
        .return_book(&request.user_account, &request.book_id)
        .await?;

    Ok(ApiResponse::ok(record.view(Utc::now())).with_message("Book returned successfully"))
}

/// Search books that are not on loan
#[utoipa::path(
    get,
    path = "/api/borrow/available",
    tag = "borrow",
    params(AvailableBooksQuery),
    responses(
        (status = 200, description = "Borrowable books", body = Vec<Book>),
        (status = 400, description = "Missing keyword")
    )
)]
pub async fn available_books(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AvailableBooksQuery>,
) -> AppResult<ApiResponse<Vec<Book>>> {
    let page = state.services.catalog.search_available(&query).await?;
    Ok(page.into())
}

/// A user's books currently on loan
#[utoipa::path(
    get,
    path = "/api/borrow/borrowed",
    tag = "borrow",
    params(UserListQuery),
    responses(
        (status = 200, description = "Active loans", body = Vec<UserLoanEntry>),
        (status = 400, description = "Missing user account")
    )
)]
pub async fn user_loans(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<ApiResponse<Vec<UserLoanEntry>>> {
    let page = state.services.borrows.list_user_loans(&query).await?;
    Ok(page.into())
}

/// All loan records, filtered by status
#[utoipa::path(
    get,
    path = "/api/borrow/list",
    tag = "borrow",
    params(RecordListQuery),
    responses(
        (status = 200, description = "Loan records", body = Vec<RecordListEntry>),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<RecordListQuery>,
) -> AppResult<ApiResponse<Vec<RecordListEntry>>> {
    let page = state.services.borrows.list_records(&query).await?;
    Ok(page.into())
}

/// Fetch one loan record
#[utoipa::path(
    get,
    path = "/api/borrow/records/{record_id}",
    tag = "borrow",
    params(("record_id" = i32, Path, description = "Record ID")),
    responses(
        (status = 200, description = "Loan record", body = BorrowRecordView),
        (status = 404, description = "Record not found")
    )
)]
pub async fn get_record(
    State(state): State<AppState>,
    AppPath(record_id): AppPath<i32>,
) -> AppResult<ApiResponse<BorrowRecordView>> {
    let record = state.services.borrows.get_record(record_id).await?;
    Ok(ApiResponse::ok(record.view(Utc::now())))
}

/// Delete a loan record
#[utoipa::path(
    delete,
    path = "/api/borrow/{record_id}",
    tag = "borrow",
    params(("record_id" = i32, Path, description = "Record ID")),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "Record not found")
    )
)]
pub async fn delete_record(
    State(state): State<AppState>,
    AppPath(record_id): AppPath<i32>,
) -> AppResult<ApiResponse<()>> {
    state.services.borrows.delete_record(record_id).await?;
    Ok(ApiResponse::message("Borrow record deleted"))
}

/// Applications from the users an admin is responsible for
#[utoipa::path(
    get,
    path = "/api/borrow/applications",
    tag = "borrow",
    params(AdminApplicationsQuery),
    responses(
        (status = 200, description = "Applications, newest first", body = Vec<ApplicationListEntry>),
        (status = 400, description = "Missing admin account")
    )
)]
pub async fn list_applications(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AdminApplicationsQuery>,
) -> AppResult<ApiResponse<Vec<ApplicationListEntry>>> {
    let page = state.services.borrows.list_admin_applications(&query).await?;
    Ok(page.into())
}

/// Approve or reject a pending application
#[utoipa::path(
    post,
    path = "/api/borrow/applications/{application_id}/process",
    tag = "borrow",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body = ProcessRequest,
    responses(
        (status = 200, description = "Application processed", body = ProcessResponse),
        (status = 404, description = "Application not found"),
        (status = 409, description = "Already processed, or the book is on loan")
    )
)]
pub async fn process_application(
    State(state): State<AppState>,
    AppPath(application_id): AppPath<i32>,
    AppJson(request): AppJson<ProcessRequest>,
) -> AppResult<ApiResponse<ProcessResponse>> {
    let processed = state
        .services
        .borrows
        .process_application(application_id, request.decision, request.admin_remark)
        .await?;

    let now = Utc::now();
    let message = format!("Application {}", processed.application.status.label());
    Ok(ApiResponse::ok(ProcessResponse {
        application: processed.application.view(),
        record: processed.record.map(|r| r.view(now)),
    })
    .with_message(message))
}
