//! Loans and applications repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Transaction};

use super::{unique_violation, BorrowStore, BorrowTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        application::{ApplicationDecision, ApplicationDetails, ApplicationFilter, BorrowApplication, NewApplication},
        enums::{LoanScope, LoanStatusFilter},
        loan::{BorrowRecord, BorrowRecordDetails, NewBorrowRecord, UserLoan},
        pagination::PageRequest,
        user::User,
    },
};

macro_rules! record_columns {
    () => {
        "br.record_id, br.book_id, br.user_account, br.status, br.borrow_time, br.should_return_time, br.return_time"
    };
}

macro_rules! application_columns {
    () => {
        "ba.application_id, ba.book_id, ba.user_account, ba.admin_account, ba.status, \
         ba.apply_time, ba.process_time, ba.user_remark, ba.admin_remark"
    };
}

/// Status filter shared by the record listing and its count.
/// $1 = filter (1 on loan, 2 returned, 3 overdue), $2 = now
macro_rules! record_filter {
    () => {
        "(($1 = 1 AND br.status = 1)
          OR ($1 = 2 AND br.status = 2)
          OR ($1 = 3 AND (br.status = 3 OR (br.status = 1 AND br.should_return_time < $2))))"
    };
}

const LIST_APPLICATIONS_FOR_ADMIN: &str = concat!(
    "SELECT ",
    application_columns!(),
    ", b.title AS book_title, u.nickname AS user_nickname
    FROM borrow_applications ba
    JOIN books b ON b.book_id = ba.book_id
    JOIN users u ON u.user_account = ba.user_account
    WHERE u.admin_account = $1
    ORDER BY ba.apply_time DESC, ba.application_id DESC
    LIMIT $2 OFFSET $3"
);

const COUNT_APPLICATIONS_FOR_ADMIN: &str = "SELECT COUNT(*) FROM borrow_applications ba
    JOIN users u ON u.user_account = ba.user_account
    WHERE u.admin_account = $1";

const LIST_APPLICATIONS_FOR_USER: &str = concat!(
    "SELECT ",
    application_columns!(),
    ", b.title AS book_title, u.nickname AS user_nickname
    FROM borrow_applications ba
    JOIN books b ON b.book_id = ba.book_id
    JOIN users u ON u.user_account = ba.user_account
    WHERE ba.user_account = $1
    ORDER BY ba.apply_time DESC, ba.application_id DESC
    LIMIT $2 OFFSET $3"
);

const COUNT_APPLICATIONS_FOR_USER: &str =
    "SELECT COUNT(*) FROM borrow_applications WHERE user_account = $1";

fn filter_code(filter: LoanStatusFilter) -> i16 {
    match filter {
        LoanStatusFilter::OnLoan => 1,
        LoanStatusFilter::Returned => 2,
        LoanStatusFilter::Overdue => 3,
    }
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowStore for BorrowsRepository {
    async fn begin(&self) -> AppResult<Box<dyn BorrowTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgBorrowTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_record(&self, record_id: i32) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM borrow_records br WHERE br.record_id = $1"
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_records(
        &self,
        filter: LoanStatusFilter,
        now: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        let code = filter_code(filter);

        let total: i64 = sqlx::query_scalar(concat!(
            "SELECT COUNT(*) FROM borrow_records br WHERE ",
            record_filter!()
        ))
        .bind(code)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, BorrowRecordDetails>(concat!(
            "SELECT ",
            record_columns!(),
            ", b.title AS book_title, u.nickname
            FROM borrow_records br
            JOIN books b ON b.book_id = br.book_id
            JOIN users u ON u.user_account = br.user_account
            WHERE ",
            record_filter!(),
            " ORDER BY br.borrow_time DESC, br.record_id DESC
            LIMIT $3 OFFSET $4"
        ))
        .bind(code)
        .bind(now)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    async fn list_user_loans(
        &self,
        user_account: &str,
        scope: LoanScope,
        now: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<(Vec<UserLoan>, i64)> {
        let include_all = scope == LoanScope::All;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE user_account = $1 AND ($2 OR status IN (1, 3))",
        )
        .bind(user_account)
        .bind(include_all)
        .fetch_one(&self.pool)
        .await?;

        let loans = sqlx::query_as::<_, UserLoan>(concat!(
            "SELECT b.title, b.author, b.publisher, b.category, b.publication_year, b.language, ",
            record_columns!(),
            " FROM borrow_records br
            JOIN books b ON b.book_id = br.book_id
            WHERE br.user_account = $1 AND ($2 OR br.status IN (1, 3))
            ORDER BY
                CASE
                    WHEN br.status = 3 OR (br.status = 1 AND br.should_return_time < $3) THEN 1
                    WHEN br.status IN (1, 3) THEN 2
                    ELSE 3
                END,
                br.borrow_time DESC,
                br.record_id DESC
            LIMIT $4 OFFSET $5"
        ))
        .bind(user_account)
        .bind(include_all)
        .bind(now)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((loans, total))
    }

    async fn list_applications(
        &self,
        filter: ApplicationFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<ApplicationDetails>, i64)> {
        let (list_sql, count_sql, account) = match filter {
            ApplicationFilter::AssignedTo(admin) => {
                (LIST_APPLICATIONS_FOR_ADMIN, COUNT_APPLICATIONS_FOR_ADMIN, admin)
            }
            ApplicationFilter::SubmittedBy(user) => {
                (LIST_APPLICATIONS_FOR_USER, COUNT_APPLICATIONS_FOR_USER, user)
            }
        };

        let total: i64 = sqlx::query_scalar(count_sql)
            .bind(&account)
            .fetch_one(&self.pool)
            .await?;

        let applications = sqlx::query_as::<_, ApplicationDetails>(list_sql)
            .bind(&account)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((applications, total))
    }
}

/// Postgres transaction behind [`BorrowTx`]
pub struct PgBorrowTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgBorrowTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already finished".to_string()))
    }
}

#[async_trait]
impl BorrowTx for PgBorrowTx {
    async fn book_exists(&mut self, book_id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE book_id = $1)")
            .bind(book_id)
            .fetch_one(self.conn()?)
            .await?;
        Ok(exists)
    }

    async fn find_user(&mut self, user_account: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_account, user_password, nickname, status, admin_account
            FROM users
            WHERE user_account = $1
            "#,
        )
        .bind(user_account)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(user)
    }

    async fn admin_exists(&mut self, admin_account: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admins WHERE admin_account = $1)")
                .bind(admin_account)
                .fetch_one(self.conn()?)
                .await?;
        Ok(exists)
    }

    async fn active_loan_for_book(&mut self, book_id: &str) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM borrow_records br WHERE br.book_id = $1 AND br.status IN (1, 3) FOR UPDATE"
        ))
        .bind(book_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(record)
    }

    async fn active_loan(&mut self, book_id: &str, user_account: &str) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM borrow_records br
            WHERE br.book_id = $1 AND br.user_account = $2 AND br.status IN (1, 3)
            FOR UPDATE"
        ))
        .bind(book_id)
        .bind(user_account)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(record)
    }

    async fn insert_record(&mut self, record: NewBorrowRecord) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>(concat!(
            "INSERT INTO borrow_records AS br (book_id, user_account, status, borrow_time, should_return_time)
            VALUES ($1, $2, 1, $3, $4)
            RETURNING ",
            record_columns!()
        ))
        .bind(&record.book_id)
        .bind(&record.user_account)
        .bind(record.borrow_time)
        .bind(record.should_return_time)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| unique_violation(e, "book already on loan"))
    }

    async fn mark_returned(&mut self, record_id: i32, at: DateTime<Utc>) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(concat!(
            "UPDATE borrow_records AS br SET status = 2, return_time = $2
            WHERE br.record_id = $1 AND br.status IN (1, 3)
            RETURNING ",
            record_columns!()
        ))
        .bind(record_id)
        .bind(at)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(record)
    }

    async fn get_record(&mut self, record_id: i32) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM borrow_records br WHERE br.record_id = $1 FOR UPDATE"
        ))
        .bind(record_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(record)
    }

    async fn delete_record(&mut self, record_id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM borrow_records WHERE record_id = $1")
            .bind(record_id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_pending_application(&mut self, book_id: &str, user_account: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrow_applications
                WHERE book_id = $1 AND user_account = $2 AND status = 0
            )
            "#,
        )
        .bind(book_id)
        .bind(user_account)
        .fetch_one(self.conn()?)
        .await?;
        Ok(exists)
    }

    async fn insert_application(&mut self, application: NewApplication) -> AppResult<BorrowApplication> {
        sqlx::query_as::<_, BorrowApplication>(concat!(
            "INSERT INTO borrow_applications AS ba (book_id, user_account, admin_account, status, apply_time, user_remark)
            VALUES ($1, $2, $3, 0, $4, $5)
            RETURNING ",
            application_columns!()
        ))
        .bind(&application.book_id)
        .bind(&application.user_account)
        .bind(&application.admin_account)
        .bind(application.apply_time)
        .bind(&application.user_remark)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| unique_violation(e, "duplicate application"))
    }

    async fn get_application(&mut self, application_id: i32) -> AppResult<Option<BorrowApplication>> {
        let application = sqlx::query_as::<_, BorrowApplication>(concat!(
            "SELECT ",
            application_columns!(),
            " FROM borrow_applications ba WHERE ba.application_id = $1 FOR UPDATE"
        ))
        .bind(application_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(application)
    }

    async fn update_application(
        &mut self,
        application_id: i32,
        decision: ApplicationDecision,
    ) -> AppResult<BorrowApplication> {
        sqlx::query_as::<_, BorrowApplication>(concat!(
            "UPDATE borrow_applications AS ba
            SET status = $2, admin_remark = $3, process_time = $4
            WHERE ba.application_id = $1
            RETURNING ",
            application_columns!()
        ))
        .bind(application_id)
        .bind(decision.status)
        .bind(&decision.admin_remark)
        .bind(decision.process_time)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| AppError::not_found("application"))
    }

    async fn commit(&mut self) -> AppResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
