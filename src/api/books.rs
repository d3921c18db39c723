//! Catalog endpoints

use axum::extract::State;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery},
    AppState,
};

use super::{ApiResponse, AppQuery};

/// Browse the catalog
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Books matching the filters", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<BookQuery>,
) -> AppResult<ApiResponse<Vec<Book>>> {
    let page = state.services.catalog.search_books(&query).await?;
    Ok(page.into())
}
