//! Book catalog model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Catalog book. Read-only from the borrow workflow's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub category: Option<String>,
    pub publication_year: Option<i32>,
    pub language: Option<String>,
}

impl Book {
    /// Case-insensitive substring match on title, author or id
    pub fn matches_keyword(&self, keyword: &str, include_id: bool) -> bool {
        let needle = keyword.to_lowercase();
        let contains = |s: &str| s.to_lowercase().contains(&needle);

        contains(&self.title)
            || self.author.as_deref().map(contains).unwrap_or(false)
            || (include_id && contains(&self.book_id))
    }
}

/// Catalog browse query
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Matches title or author
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Search among books that are not currently on loan
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AvailableBooksQuery {
    /// Matches title, author or book id. Required.
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}
