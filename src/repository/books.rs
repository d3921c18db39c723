//! Books repository for catalog queries

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::BookStore;
use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery},
        pagination::PageRequest,
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn search(&self, query: &BookQuery, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let keyword = query
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", k.to_lowercase()));
        let category = query.category.as_deref().filter(|c| !c.is_empty());

        // NULL parameters disable their filter
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE ($1::text IS NULL OR LOWER(title) LIKE $1 OR LOWER(author) LIKE $1)
              AND ($2::text IS NULL OR category = $2)
            "#,
        )
        .bind(&keyword)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT book_id, title, author, publisher, category, publication_year, language
            FROM books
            WHERE ($1::text IS NULL OR LOWER(title) LIKE $1 OR LOWER(author) LIKE $1)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY title, book_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&keyword)
        .bind(category)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    async fn search_available(&self, keyword: &str, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let pattern = format!("%{}%", keyword.to_lowercase());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books b
            WHERE NOT EXISTS (
                SELECT 1 FROM borrow_records br WHERE br.book_id = b.book_id AND br.status IN (1, 3)
            )
            AND (LOWER(b.title) LIKE $1 OR LOWER(b.author) LIKE $1 OR LOWER(b.book_id) LIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.book_id, b.title, b.author, b.publisher, b.category, b.publication_year, b.language
            FROM books b
            WHERE NOT EXISTS (
                SELECT 1 FROM borrow_records br WHERE br.book_id = b.book_id AND br.status IN (1, 3)
            )
            AND (LOWER(b.title) LIKE $1 OR LOWER(b.author) LIKE $1 OR LOWER(b.book_id) LIKE $1)
            ORDER BY b.title, b.book_id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }
}
