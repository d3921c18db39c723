//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrows, health, user_borrows};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Book borrowing, returns and borrow applications"
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrow desk
        borrows::borrow_book,
        borrows::return_book,
        borrows::available_books,
        borrows::user_loans,
        borrows::list_records,
        borrows::get_record,
        borrows::delete_record,
        borrows::list_applications,
        borrows::process_application,
        // Reader side
        user_borrows::apply,
        user_borrows::my_applications,
        user_borrows::loan_history,
        // Catalog
        books::list_books,
        // Auth
        auth::register,
        auth::login,
    ),
    components(
        schemas(
            // Catalog
            crate::models::book::Book,
            // Loans
            crate::models::loan::LoanRequest,
            crate::models::loan::BorrowRecordView,
            crate::models::loan::RecordListEntry,
            crate::models::loan::UserLoanEntry,
            crate::models::enums::LoanStatus,
            // Applications
            crate::models::application::ApplyRequest,
            crate::models::application::ProcessRequest,
            crate::models::application::ProcessResponse,
            crate::models::application::ApplicationView,
            crate::models::application::ApplicationListEntry,
            crate::models::enums::ApplicationStatus,
            crate::models::enums::Decision,
            // Accounts
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            crate::models::user::AccountInfo,
            crate::models::enums::AccountKind,
            // Envelope
            crate::models::pagination::Pagination,
            crate::error::ErrorResponse,
            // Health
            health::HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrow", description = "Loan desk and application review"),
        (name = "userborrow", description = "Reader borrow applications and history"),
        (name = "books", description = "Catalog browsing"),
        (name = "auth", description = "Registration and login")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
