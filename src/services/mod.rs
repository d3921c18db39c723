//! Business logic services

pub mod auth;
pub mod borrows;
pub mod catalog;

use crate::{config::LoansConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, loans: &LoansConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.accounts),
            catalog: catalog::CatalogService::new(repository.books, loans.max_page_size),
            borrows: borrows::BorrowService::new(repository.borrows, borrows::LoanPolicy::from(loans)),
        }
    }
}
