//! Borrow lifecycle: loans, returns and borrow applications
//!
//! Every mutation runs inside one storage transaction. Preconditions are
//! checked in a fixed order inside that transaction, and the transaction is
//! committed on success or rolled back before the error is returned.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        application::{
            AdminApplicationsQuery, ApplicationDecision, ApplicationFilter, ApplicationListEntry, ApplyRequest,
            BorrowApplication, NewApplication, ProcessedApplication,
        },
        enums::{Decision, LoanScope, LoanStatusFilter},
        loan::{BorrowRecord, NewBorrowRecord, RecordListEntry, RecordListQuery, UserListQuery, UserLoanEntry},
        pagination::{PageRequest, Paginated},
    },
    repository::{BorrowStore, BorrowTx},
    services::auth::verify_password,
};

/// Loan rules taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct LoanPolicy {
    pub loan_period: Duration,
    pub max_page_size: i64,
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self {
            loan_period: Duration::days(config.loan_period_days),
            max_page_size: config.max_page_size,
        }
    }
}

#[derive(Clone)]
pub struct BorrowService {
    store: Arc<dyn BorrowStore>,
    policy: LoanPolicy,
}

impl BorrowService {
    pub fn new(store: Arc<dyn BorrowStore>, policy: LoanPolicy) -> Self {
        Self { store, policy }
    }

    /// Lend a book to a user
    pub async fn borrow_book(&self, user_account: &str, book_id: &str) -> AppResult<BorrowRecord> {
        let user_account = require_field("userAccount", user_account)?;
        let book_id = require_field("bookId", book_id)?;

        let mut tx = self.store.begin().await?;
        let result = self.lend(tx.as_mut(), book_id, user_account, Utc::now()).await;
        let record = finish(tx, result).await?;

        tracing::info!(
            "Book {} lent to {} (record {}), due {}",
            record.book_id,
            record.user_account,
            record.record_id,
            record.should_return_time
        );
        Ok(record)
    }

    /// Close the user's active loan of a book
    pub async fn return_book(&self, user_account: &str, book_id: &str) -> AppResult<BorrowRecord> {
        let user_account = require_field("userAccount", user_account)?;
        let book_id = require_field("bookId", book_id)?;

        let mut tx = self.store.begin().await?;
        let result = async {
            let loan = tx
                .active_loan(book_id, user_account)
                .await?
                .ok_or_else(|| AppError::not_found("active loan"))?;

            tx.mark_returned(loan.record_id, Utc::now())
                .await?
                .ok_or_else(|| AppError::not_found("active loan"))
        }
        .await;
        let record = finish(tx, result).await?;

        tracing::info!("Book {} returned by {} (record {})", record.book_id, record.user_account, record.record_id);
        Ok(record)
    }

    /// Submit a borrow application for staff approval
    pub async fn apply_to_borrow(&self, request: ApplyRequest) -> AppResult<BorrowApplication> {
        let book_id = require_field("bookId", &request.book_id)?;
        let user_account = require_field("userAccount", &request.user_account)?;
        let admin_account = optional_field(request.admin_account.as_deref());
        let user_remark = optional_field(request.user_remark.as_deref()).map(str::to_string);

        let mut tx = self.store.begin().await?;
        let result = async {
            if !tx.book_exists(book_id).await? {
                return Err(AppError::not_found("book"));
            }
            if tx.has_pending_application(book_id, user_account).await? {
                return Err(AppError::conflict("duplicate application"));
            }
            if tx.active_loan_for_book(book_id).await?.is_some() {
                return Err(AppError::conflict("book already on loan"));
            }

            let user = tx
                .find_user(user_account)
                .await?
                .ok_or_else(|| AppError::not_found("user"))?;

            let approver = match admin_account {
                Some(admin) => {
                    if !tx.admin_exists(admin).await? {
                        return Err(AppError::not_found("admin"));
                    }
                    admin.to_string()
                }
                None => user.admin_account.clone(),
            };

            if let Some(password) = request.password.as_deref() {
                if !verify_password(&user.user_password, password)? {
                    return Err(AppError::Authentication("Invalid account or password".to_string()));
                }
            }

            tx.insert_application(NewApplication {
                book_id: book_id.to_string(),
                user_account: user_account.to_string(),
                admin_account: approver,
                user_remark,
                apply_time: Utc::now(),
            })
            .await
        }
        .await;
        let application = finish(tx, result).await?;

        tracing::info!(
            "Application {} from {} for book {} assigned to {}",
            application.application_id,
            application.user_account,
            application.book_id,
            application.admin_account
        );
        Ok(application)
    }

    /// Approve or reject a pending application.
    ///
    /// Approval lends the book to the applicant in the same transaction; when
    /// the book is on loan nothing changes and the application stays pending.
    pub async fn process_application(
        &self,
        application_id: i32,
        decision: Decision,
        admin_remark: Option<String>,
    ) -> AppResult<ProcessedApplication> {
        let admin_remark = optional_field(admin_remark.as_deref()).map(str::to_string);

        let mut tx = self.store.begin().await?;
        let result = async {
            let application = tx
                .get_application(application_id)
                .await?
                .ok_or_else(|| AppError::not_found("application"))?;
            let status = application.status.decide(decision)?;
            let now = Utc::now();

            let record = match decision {
                Decision::Approve => Some(
                    self.lend(tx.as_mut(), &application.book_id, &application.user_account, now)
                        .await?,
                ),
                Decision::Reject => None,
            };

            let application = tx
                .update_application(
                    application_id,
                    ApplicationDecision {
                        status,
                        admin_remark,
                        process_time: now,
                    },
                )
                .await?;

            Ok(ProcessedApplication { application, record })
        }
        .await;
        let processed = finish(tx, result).await?;

        tracing::info!(
            "Application {} {}",
            processed.application.application_id,
            processed.application.status.label()
        );
        Ok(processed)
    }

    /// Hard-delete a borrow record
    pub async fn delete_record(&self, record_id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let result = async {
            if tx.get_record(record_id).await?.is_none() || !tx.delete_record(record_id).await? {
                return Err(AppError::not_found("borrow record"));
            }
            Ok(())
        }
        .await;
        finish(tx, result).await?;

        tracing::info!("Borrow record {} deleted", record_id);
        Ok(())
    }

    pub async fn get_record(&self, record_id: i32) -> AppResult<BorrowRecord> {
        self.store
            .get_record(record_id)
            .await?
            .ok_or_else(|| AppError::not_found("borrow record"))
    }

    /// Storage round-trip for readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }

    /// Staff listing of loan records
    pub async fn list_records(&self, query: &RecordListQuery) -> AppResult<Paginated<RecordListEntry>> {
        let filter = query
            .status
            .map(LoanStatusFilter::try_from)
            .transpose()?
            .unwrap_or_default();
        let page = self.page(query.page, query.size);
        let now = Utc::now();

        let (records, total) = self.store.list_records(filter, now, &page).await?;
        Ok(Paginated::new(records, &page, total).map(|details| RecordListEntry::new(details, now)))
    }

    /// A user's books currently on loan
    pub async fn list_user_loans(&self, query: &UserListQuery) -> AppResult<Paginated<UserLoanEntry>> {
        self.user_loans(query, LoanScope::Active).await
    }

    /// All of a user's loans, overdue first
    pub async fn list_user_history(&self, query: &UserListQuery) -> AppResult<Paginated<UserLoanEntry>> {
        self.user_loans(query, LoanScope::All).await
    }

    /// Applications from the users assigned to an admin
    pub async fn list_admin_applications(
        &self,
        query: &AdminApplicationsQuery,
    ) -> AppResult<Paginated<ApplicationListEntry>> {
        let admin_account = require_field("admin_account", query.admin_account.as_deref().unwrap_or_default())?;
        let page = self.page(query.page, query.size);

        let (applications, total) = self
            .store
            .list_applications(ApplicationFilter::AssignedTo(admin_account.to_string()), &page)
            .await?;
        Ok(Paginated::new(applications, &page, total).map(ApplicationListEntry::from))
    }

    /// A user's own applications
    pub async fn list_user_applications(&self, query: &UserListQuery) -> AppResult<Paginated<ApplicationListEntry>> {
        let user_account = require_field("userAccount", query.user_account.as_deref().unwrap_or_default())?;
        let page = self.page(query.page, query.size);

        let (applications, total) = self
            .store
            .list_applications(ApplicationFilter::SubmittedBy(user_account.to_string()), &page)
            .await?;
        Ok(Paginated::new(applications, &page, total).map(ApplicationListEntry::from))
    }

    async fn user_loans(&self, query: &UserListQuery, scope: LoanScope) -> AppResult<Paginated<UserLoanEntry>> {
        let user_account = require_field("userAccount", query.user_account.as_deref().unwrap_or_default())?;
        let page = self.page(query.page, query.size);
        let now = Utc::now();

        let (loans, total) = self.store.list_user_loans(user_account, scope, now, &page).await?;
        Ok(Paginated::new(loans, &page, total).map(|loan| UserLoanEntry::new(loan, now)))
    }

    /// Borrow preconditions followed by the insert, on an open transaction
    async fn lend(
        &self,
        tx: &mut dyn BorrowTx,
        book_id: &str,
        user_account: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        if !tx.book_exists(book_id).await? {
            return Err(AppError::not_found("book"));
        }
        if tx.active_loan_for_book(book_id).await?.is_some() {
            return Err(AppError::conflict("book already on loan"));
        }
        if tx.find_user(user_account).await?.is_none() {
            return Err(AppError::not_found("user"));
        }

        tx.insert_record(NewBorrowRecord {
            book_id: book_id.to_string(),
            user_account: user_account.to_string(),
            borrow_time: now,
            should_return_time: now + self.policy.loan_period,
        })
        .await
    }

    fn page(&self, page: Option<i64>, size: Option<i64>) -> PageRequest {
        PageRequest::new(page, size, self.policy.max_page_size)
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(mut tx: Box<dyn BorrowTx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            match &err {
                AppError::Database(_) | AppError::Internal(_) => {
                    tracing::warn!("Rolling back transaction: {}", err)
                }
                _ => tracing::debug!("Rejected: {}", err),
            }
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

fn require_field<'a>(name: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", name)));
    }
    Ok(value)
}

fn optional_field(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
