//! In-process store implementing every repository trait.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! copy of the data, so transactions are serializable and a dropped or
//! rolled back transaction leaves no trace.

use std::{cmp::Reverse, collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{AccountStore, BookStore, BorrowStore, BorrowTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        application::{ApplicationDecision, ApplicationDetails, ApplicationFilter, BorrowApplication, NewApplication},
        book::{Book, BookQuery},
        enums::{AccountKind, ApplicationStatus, LoanScope, LoanStatus, LoanStatusFilter},
        loan::{BorrowRecord, BorrowRecordDetails, NewBorrowRecord, UserLoan},
        pagination::PageRequest,
        user::{Account, Admin, NewAdmin, NewUser, User},
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    books: BTreeMap<String, Book>,
    users: BTreeMap<String, User>,
    admins: BTreeMap<String, Admin>,
    records: BTreeMap<i32, BorrowRecord>,
    applications: BTreeMap<i32, BorrowApplication>,
    last_record_id: i32,
    last_application_id: i32,
}

impl Tables {
    fn active_loan_for_book(&self, book_id: &str) -> Option<&BorrowRecord> {
        self.records
            .values()
            .find(|r| r.book_id == book_id && r.status.is_active())
    }

    fn nickname(&self, user_account: &str) -> String {
        self.users
            .get(user_account)
            .map(|u| u.nickname.clone())
            .unwrap_or_default()
    }

    fn book_title(&self, book_id: &str) -> String {
        self.books
            .get(book_id)
            .map(|b| b.title.clone())
            .unwrap_or_default()
    }
}

/// Shared in-memory database
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog book
    pub async fn insert_book(&self, book: Book) {
        let mut tables = self.tables.lock().await;
        tables.books.insert(book.book_id.clone(), book);
    }

    pub async fn set_user_status(&self, user_account: &str, status: i16) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(user_account)
            .ok_or_else(|| AppError::not_found("user"))?;
        user.status = status;
        Ok(())
    }

    /// Overwrite a loan's stored status, as an external overdue sweep would
    pub async fn set_record_status(&self, record_id: i32, status: LoanStatus) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .records
            .get_mut(&record_id)
            .ok_or_else(|| AppError::not_found("borrow record"))?;
        record.status = status;
        Ok(())
    }

    /// Count of loans for a book in the given status
    pub async fn count_records(&self, book_id: &str, status: LoanStatus) -> usize {
        let tables = self.tables.lock().await;
        tables
            .records
            .values()
            .filter(|r| r.book_id == book_id && r.status == status)
            .count()
    }

    /// Count of applications for a book and user in the given status
    pub async fn count_applications(&self, book_id: &str, user_account: &str, status: ApplicationStatus) -> usize {
        let tables = self.tables.lock().await;
        tables
            .applications
            .values()
            .filter(|a| a.book_id == book_id && a.user_account == user_account && a.status == status)
            .count()
    }
}

fn page_of<T>(items: Vec<T>, page: &PageRequest) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    (page.slice(items), total)
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn search(&self, query: &BookQuery, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.tables.lock().await;
        let keyword = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty());
        let category = query.category.as_deref().filter(|c| !c.is_empty());

        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| keyword.map(|k| b.matches_keyword(k, false)).unwrap_or(true))
            .filter(|b| category.map(|c| b.category.as_deref() == Some(c)).unwrap_or(true))
            .cloned()
            .collect();
        books.sort_by(|a, b| (&a.title, &a.book_id).cmp(&(&b.title, &b.book_id)));

        Ok(page_of(books, page))
    }

    async fn search_available(&self, keyword: &str, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.tables.lock().await;

        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| tables.active_loan_for_book(&b.book_id).is_none())
            .filter(|b| b.matches_keyword(keyword, true))
            .cloned()
            .collect();
        books.sort_by(|a, b| (&a.title, &a.book_id).cmp(&(&b.title, &b.book_id)));

        Ok(page_of(books, page))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find(&self, kind: AccountKind, account: &str) -> AppResult<Option<Account>> {
        let tables = self.tables.lock().await;
        Ok(match kind {
            AccountKind::User => tables.users.get(account).cloned().map(Account::User),
            AccountKind::Admin => tables.admins.get(account).cloned().map(Account::Admin),
        })
    }

    async fn admin_accounts(&self) -> AppResult<Vec<String>> {
        let tables = self.tables.lock().await;
        Ok(tables.admins.keys().cloned().collect())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.user_account) {
            return Err(AppError::conflict("account already registered"));
        }
        if !tables.admins.contains_key(&user.admin_account) {
            return Err(AppError::Internal(format!(
                "admin {} does not exist",
                user.admin_account
            )));
        }

        let row = User {
            user_account: user.user_account,
            user_password: user.password_hash,
            nickname: user.nickname,
            status: 0,
            admin_account: user.admin_account,
        };
        tables.users.insert(row.user_account.clone(), row.clone());
        Ok(row)
    }

    async fn create_admin(&self, admin: NewAdmin) -> AppResult<Admin> {
        let mut tables = self.tables.lock().await;
        if tables.admins.contains_key(&admin.admin_account) {
            return Err(AppError::conflict("account already registered"));
        }

        let row = Admin {
            admin_account: admin.admin_account,
            admin_password: admin.password_hash,
            admin_nickname: admin.nickname,
        };
        tables.admins.insert(row.admin_account.clone(), row.clone());
        Ok(row)
    }
}

#[async_trait]
impl BorrowStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn BorrowTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            working,
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_record(&self, record_id: i32) -> AppResult<Option<BorrowRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.records.get(&record_id).cloned())
    }

    async fn list_records(
        &self,
        filter: LoanStatusFilter,
        now: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        let tables = self.tables.lock().await;

        let mut records: Vec<&BorrowRecord> = tables
            .records
            .values()
            .filter(|r| match filter {
                LoanStatusFilter::OnLoan => r.status == LoanStatus::Borrowed,
                LoanStatusFilter::Returned => r.status == LoanStatus::Returned,
                LoanStatusFilter::Overdue => r.status != LoanStatus::Returned && r.is_overdue(now),
            })
            .collect();
        records.sort_by_key(|r| Reverse((r.borrow_time, r.record_id)));

        let details = records
            .into_iter()
            .map(|r| BorrowRecordDetails {
                record: r.clone(),
                book_title: tables.book_title(&r.book_id),
                nickname: tables.nickname(&r.user_account),
            })
            .collect();

        Ok(page_of(details, page))
    }

    async fn list_user_loans(
        &self,
        user_account: &str,
        scope: LoanScope,
        now: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<(Vec<UserLoan>, i64)> {
        let tables = self.tables.lock().await;

        let mut records: Vec<&BorrowRecord> = tables
            .records
            .values()
            .filter(|r| r.user_account == user_account)
            .filter(|r| scope == LoanScope::All || r.status.is_active())
            .filter(|r| tables.books.contains_key(&r.book_id))
            .collect();

        let rank = |r: &BorrowRecord| {
            if r.is_overdue(now) {
                1
            } else if r.status.is_active() {
                2
            } else {
                3
            }
        };
        records.sort_by_key(|r| (rank(r), Reverse((r.borrow_time, r.record_id))));

        let loans = records
            .into_iter()
            .filter_map(|r| {
                tables.books.get(&r.book_id).map(|book| UserLoan {
                    book: book.clone(),
                    record: r.clone(),
                })
            })
            .collect::<Vec<_>>();

        Ok(page_of(loans, page))
    }

    async fn list_applications(
        &self,
        filter: ApplicationFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<ApplicationDetails>, i64)> {
        let tables = self.tables.lock().await;

        let mut applications: Vec<&BorrowApplication> = tables
            .applications
            .values()
            .filter(|a| match &filter {
                ApplicationFilter::AssignedTo(admin) => tables
                    .users
                    .get(&a.user_account)
                    .is_some_and(|u| &u.admin_account == admin),
                ApplicationFilter::SubmittedBy(user) => &a.user_account == user,
            })
            .collect();
        applications.sort_by_key(|a| Reverse((a.apply_time, a.application_id)));

        let details = applications
            .into_iter()
            .map(|a| ApplicationDetails {
                application: a.clone(),
                book_title: tables.book_title(&a.book_id),
                user_nickname: tables.nickname(&a.user_account),
            })
            .collect();

        Ok(page_of(details, page))
    }
}

/// Transaction over a private copy of the tables
pub struct MemoryTx {
    guard: Option<OwnedMutexGuard<Tables>>,
    working: Tables,
}

impl MemoryTx {
    fn ensure_open(&self) -> AppResult<()> {
        if self.guard.is_some() {
            Ok(())
        } else {
            Err(AppError::Internal("Transaction already finished".to_string()))
        }
    }
}

#[async_trait]
impl BorrowTx for MemoryTx {
    async fn book_exists(&mut self, book_id: &str) -> AppResult<bool> {
        self.ensure_open()?;
        Ok(self.working.books.contains_key(book_id))
    }

    async fn find_user(&mut self, user_account: &str) -> AppResult<Option<User>> {
        self.ensure_open()?;
        Ok(self.working.users.get(user_account).cloned())
    }

    async fn admin_exists(&mut self, admin_account: &str) -> AppResult<bool> {
        self.ensure_open()?;
        Ok(self.working.admins.contains_key(admin_account))
    }

    async fn active_loan_for_book(&mut self, book_id: &str) -> AppResult<Option<BorrowRecord>> {
        self.ensure_open()?;
        Ok(self.working.active_loan_for_book(book_id).cloned())
    }

    async fn active_loan(&mut self, book_id: &str, user_account: &str) -> AppResult<Option<BorrowRecord>> {
        self.ensure_open()?;
        Ok(self
            .working
            .active_loan_for_book(book_id)
            .filter(|r| r.user_account == user_account)
            .cloned())
    }

    async fn insert_record(&mut self, record: NewBorrowRecord) -> AppResult<BorrowRecord> {
        self.ensure_open()?;
        if self.working.active_loan_for_book(&record.book_id).is_some() {
            return Err(AppError::conflict("book already on loan"));
        }

        self.working.last_record_id += 1;
        let row = BorrowRecord {
            record_id: self.working.last_record_id,
            book_id: record.book_id,
            user_account: record.user_account,
            status: LoanStatus::Borrowed,
            borrow_time: record.borrow_time,
            should_return_time: record.should_return_time,
            return_time: None,
        };
        self.working.records.insert(row.record_id, row.clone());
        Ok(row)
    }

    async fn mark_returned(&mut self, record_id: i32, at: DateTime<Utc>) -> AppResult<Option<BorrowRecord>> {
        self.ensure_open()?;
        Ok(self
            .working
            .records
            .get_mut(&record_id)
            .filter(|r| r.status.can_transition_to(LoanStatus::Returned))
            .map(|r| {
                r.status = LoanStatus::Returned;
                r.return_time = Some(at);
                r.clone()
            }))
    }

    async fn get_record(&mut self, record_id: i32) -> AppResult<Option<BorrowRecord>> {
        self.ensure_open()?;
        Ok(self.working.records.get(&record_id).cloned())
    }

    async fn delete_record(&mut self, record_id: i32) -> AppResult<bool> {
        self.ensure_open()?;
        Ok(self.working.records.remove(&record_id).is_some())
    }

    async fn has_pending_application(&mut self, book_id: &str, user_account: &str) -> AppResult<bool> {
        self.ensure_open()?;
        Ok(self.working.applications.values().any(|a| {
            a.book_id == book_id && a.user_account == user_account && a.status == ApplicationStatus::Pending
        }))
    }

    async fn insert_application(&mut self, application: NewApplication) -> AppResult<BorrowApplication> {
        if self
            .has_pending_application(&application.book_id, &application.user_account)
            .await?
        {
            return Err(AppError::conflict("duplicate application"));
        }

        self.working.last_application_id += 1;
        let row = BorrowApplication {
            application_id: self.working.last_application_id,
            book_id: application.book_id,
            user_account: application.user_account,
            admin_account: application.admin_account,
            status: ApplicationStatus::Pending,
            apply_time: application.apply_time,
            process_time: None,
            user_remark: application.user_remark,
            admin_remark: None,
        };
        self.working.applications.insert(row.application_id, row.clone());
        Ok(row)
    }

    async fn get_application(&mut self, application_id: i32) -> AppResult<Option<BorrowApplication>> {
        self.ensure_open()?;
        Ok(self.working.applications.get(&application_id).cloned())
    }

    async fn update_application(
        &mut self,
        application_id: i32,
        decision: ApplicationDecision,
    ) -> AppResult<BorrowApplication> {
        self.ensure_open()?;
        let application = self
            .working
            .applications
            .get_mut(&application_id)
            .ok_or_else(|| AppError::not_found("application"))?;

        application.status = decision.status;
        application.admin_remark = decision.admin_remark;
        application.process_time = Some(decision.process_time);
        Ok(application.clone())
    }

    async fn commit(&mut self) -> AppResult<()> {
        if let Some(mut guard) = self.guard.take() {
            *guard = std::mem::take(&mut self.working);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        self.guard.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn book(id: &str, title: &str) -> Book {
        Book {
            book_id: id.to_string(),
            title: title.to_string(),
            author: Some("Anon".to_string()),
            publisher: None,
            category: Some("novel".to_string()),
            publication_year: None,
            language: None,
        }
    }

    fn new_loan(book_id: &str) -> NewBorrowRecord {
        let now = Utc::now();
        NewBorrowRecord {
            book_id: book_id.to_string(),
            user_account: "u1".to_string(),
            borrow_time: now,
            should_return_time: now + Duration::days(30),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx.insert_record(new_loan("b1")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(record.record_id, 1);
        assert!(store.get_record(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_record(new_loan("b1")).await.unwrap();
        tx.rollback().await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        tx.insert_record(new_loan("b1")).await.unwrap();
        drop(tx);

        assert!(store.get_record(1).await.unwrap().is_none());
        assert_eq!(store.count_records("b1", LoanStatus::Borrowed).await, 0);
    }

    #[tokio::test]
    async fn test_single_active_loan_per_book() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_record(new_loan("b1")).await.unwrap();
        let second = tx.insert_record(new_loan("b1")).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_finished_transaction_rejects_use() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(tx.book_exists("b1").await, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_search_available_skips_books_on_loan() {
        let store = MemoryStore::new();
        store.insert_book(book("b1", "Dune")).await;
        store.insert_book(book("b2", "Dune Messiah")).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_record(new_loan("b1")).await.unwrap();
        tx.commit().await.unwrap();

        let page = PageRequest::new(None, None, 100);
        let (books, total) = store.search_available("dune", &page).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(books[0].book_id, "b2");
    }

    #[tokio::test]
    async fn test_stored_overdue_loan_stays_active() {
        let store = MemoryStore::new();
        store.insert_book(book("b1", "Dune")).await;

        let mut tx = store.begin().await.unwrap();
        let record = tx.insert_record(new_loan("b1")).await.unwrap();
        tx.commit().await.unwrap();
        store.set_record_status(record.record_id, LoanStatus::Overdue).await.unwrap();

        let page = PageRequest::new(None, None, 100);
        let (_, total) = store.search_available("dune", &page).await.unwrap();
        assert_eq!(total, 0);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.active_loan("b1", "u1").await.unwrap().is_some());
        let second = tx.insert_record(new_loan("b1")).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let returned = tx.mark_returned(record.record_id, Utc::now()).await.unwrap();
        assert_eq!(returned.map(|r| r.status), Some(LoanStatus::Returned));
        assert!(tx.mark_returned(record.record_id, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_loans_total_matches_rows() {
        let store = MemoryStore::new();
        store.insert_book(book("b1", "Dune")).await;

        // b2 has a loan but no catalog entry
        let mut tx = store.begin().await.unwrap();
        tx.insert_record(new_loan("b1")).await.unwrap();
        tx.insert_record(new_loan("b2")).await.unwrap();
        tx.commit().await.unwrap();

        let page = PageRequest::new(None, None, 100);
        let (loans, total) = store
            .list_user_loans("u1", LoanScope::All, Utc::now(), &page)
            .await
            .unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(total, 1);
    }
}
