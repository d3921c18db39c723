//! Catalog search service

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{AvailableBooksQuery, Book, BookQuery},
        pagination::{PageRequest, Paginated},
    },
    repository::BookStore,
};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookStore>,
    max_page_size: i64,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BookStore>, max_page_size: i64) -> Self {
        Self { books, max_page_size }
    }

    /// Browse the catalog with optional keyword and category filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Paginated<Book>> {
        let page = PageRequest::new(query.page, query.size, self.max_page_size);
        let (books, total) = self.books.search(query, &page).await?;
        Ok(Paginated::new(books, &page, total))
    }

    /// Books that can be borrowed right now
    pub async fn search_available(&self, query: &AvailableBooksQuery) -> AppResult<Paginated<Book>> {
        let keyword = query
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Validation("keyword is required".to_string()))?;

        let page = PageRequest::new(query.page, query.size, self.max_page_size);
        let (books, total) = self.books.search_available(keyword, &page).await?;
        Ok(Paginated::new(books, &page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn book(id: &str, title: &str, category: &str) -> Book {
        Book {
            book_id: id.to_string(),
            title: title.to_string(),
            author: Some("Frank Herbert".to_string()),
            publisher: None,
            category: Some(category.to_string()),
            publication_year: Some(1965),
            language: Some("en".to_string()),
        }
    }

    async fn catalog() -> CatalogService {
        let store = MemoryStore::new();
        store.insert_book(book("b1", "Dune", "sf")).await;
        store.insert_book(book("b2", "Dune Messiah", "sf")).await;
        store.insert_book(book("b3", "Children of Dune", "classics")).await;
        CatalogService::new(Arc::new(store), 100)
    }

    #[tokio::test]
    async fn test_search_filters_by_category() {
        let catalog = catalog().await;
        let query = BookQuery {
            keyword: Some("dune".to_string()),
            category: Some("sf".to_string()),
            ..Default::default()
        };

        let result = catalog.search_books(&query).await.unwrap();
        assert_eq!(result.pagination.total, 2);
        assert!(result.items.iter().all(|b| b.category.as_deref() == Some("sf")));
    }

    #[tokio::test]
    async fn test_search_available_requires_keyword() {
        let catalog = catalog().await;
        let query = AvailableBooksQuery {
            keyword: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            catalog.search_available(&query).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_available_matches_book_id() {
        let catalog = catalog().await;
        let query = AvailableBooksQuery {
            keyword: Some("B3".to_string()),
            ..Default::default()
        };
        let result = catalog.search_available(&query).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].title, "Children of Dune");
    }
}
