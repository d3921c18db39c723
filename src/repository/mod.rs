//! Repository layer for database operations
//!
//! Services depend on the store traits defined here, never on a concrete
//! backend. [`Repository::new`] wires the Postgres implementations and
//! [`Repository::in_memory`] the in-process one used by tests.

pub mod accounts;
pub mod books;
pub mod borrows;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        application::{ApplicationDecision, ApplicationDetails, ApplicationFilter, BorrowApplication, NewApplication},
        book::{Book, BookQuery},
        enums::{AccountKind, LoanScope, LoanStatusFilter},
        loan::{BorrowRecord, BorrowRecordDetails, NewBorrowRecord, UserLoan},
        pagination::PageRequest,
        user::{Account, Admin, NewAdmin, NewUser, User},
    },
};

pub use memory::MemoryStore;

/// Catalog reads
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Browse the catalog by keyword (title/author) and category
    async fn search(&self, query: &BookQuery, page: &PageRequest) -> AppResult<(Vec<Book>, i64)>;

    /// Books without an active loan whose title, author or id match `keyword`
    async fn search_available(&self, keyword: &str, page: &PageRequest) -> AppResult<(Vec<Book>, i64)>;
}

/// User and admin accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, kind: AccountKind, account: &str) -> AppResult<Option<Account>>;

    async fn admin_accounts(&self) -> AppResult<Vec<String>>;

    /// Fails with `Conflict` when the account already exists
    async fn create_user(&self, user: NewUser) -> AppResult<User>;

    /// Fails with `Conflict` when the account already exists
    async fn create_admin(&self, admin: NewAdmin) -> AppResult<Admin>;
}

/// Loans and applications.
///
/// Mutations go through a [`BorrowTx`] obtained from [`BorrowStore::begin`];
/// the read-side listings run outside transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn BorrowTx>>;

    async fn ping(&self) -> AppResult<()>;

    async fn get_record(&self, record_id: i32) -> AppResult<Option<BorrowRecord>>;

    /// Staff listing, newest borrow first
    async fn list_records(
        &self,
        filter: LoanStatusFilter,
        now: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<(Vec<BorrowRecordDetails>, i64)>;

    /// A user's loans: overdue first, then on loan, then returned, newest first
    /// within each group
    async fn list_user_loans(
        &self,
        user_account: &str,
        scope: LoanScope,
        now: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<(Vec<UserLoan>, i64)>;

    /// Applications, newest first
    async fn list_applications(
        &self,
        filter: ApplicationFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<ApplicationDetails>, i64)>;
}

/// One storage transaction.
///
/// Dropping a transaction that was neither committed nor rolled back
/// discards its writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowTx: Send {
    async fn book_exists(&mut self, book_id: &str) -> AppResult<bool>;

    async fn find_user(&mut self, user_account: &str) -> AppResult<Option<User>>;

    async fn admin_exists(&mut self, admin_account: &str) -> AppResult<bool>;

    /// The book's current loan, whoever holds it
    async fn active_loan_for_book(&mut self, book_id: &str) -> AppResult<Option<BorrowRecord>>;

    /// The book's current loan held by `user_account`
    async fn active_loan(&mut self, book_id: &str, user_account: &str) -> AppResult<Option<BorrowRecord>>;

    /// Fails with `Conflict` when the book already has an active loan
    async fn insert_record(&mut self, record: NewBorrowRecord) -> AppResult<BorrowRecord>;

    /// Returns `None` when the record is no longer on loan
    async fn mark_returned(&mut self, record_id: i32, at: DateTime<Utc>) -> AppResult<Option<BorrowRecord>>;

    async fn get_record(&mut self, record_id: i32) -> AppResult<Option<BorrowRecord>>;

    async fn delete_record(&mut self, record_id: i32) -> AppResult<bool>;

    async fn has_pending_application(&mut self, book_id: &str, user_account: &str) -> AppResult<bool>;

    /// Fails with `Conflict` when the pair already has a pending application
    async fn insert_application(&mut self, application: NewApplication) -> AppResult<BorrowApplication>;

    /// Loads the application and locks it for the rest of the transaction
    async fn get_application(&mut self, application_id: i32) -> AppResult<Option<BorrowApplication>>;

    async fn update_application(
        &mut self,
        application_id: i32,
        decision: ApplicationDecision,
    ) -> AppResult<BorrowApplication>;

    async fn commit(&mut self) -> AppResult<()>;

    async fn rollback(&mut self) -> AppResult<()>;
}

/// Main repository struct holding the store implementations
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub borrows: Arc<dyn BorrowStore>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            accounts: Arc::new(accounts::AccountsRepository::new(pool.clone())),
            borrows: Arc::new(borrows::BorrowsRepository::new(pool)),
        }
    }

    /// Repository backed by an in-process store
    pub fn in_memory(store: MemoryStore) -> Self {
        Self {
            books: Arc::new(store.clone()),
            accounts: Arc::new(store.clone()),
            borrows: Arc::new(store),
        }
    }
}

/// Map a unique-index violation to a `Conflict`; other errors stay opaque
pub(crate) fn unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => AppError::conflict(message),
        _ => AppError::Database(err),
    }
}
