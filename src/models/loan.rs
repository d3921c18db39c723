//! Loan (borrow record) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::{book::Book, enums::LoanStatus};

/// Display format for timestamps
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Display format for due dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BorrowRecord {
    pub record_id: i32,
    pub book_id: String,
    pub user_account: String,
    pub status: LoanStatus,
    pub borrow_time: DateTime<Utc>,
    pub should_return_time: DateTime<Utc>,
    pub return_time: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    /// Overdue is computed on read: still out and past its due time
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            LoanStatus::Overdue => true,
            LoanStatus::Borrowed => self.should_return_time < now,
            LoanStatus::Returned => false,
        }
    }

    pub fn display_status(&self, now: DateTime<Utc>) -> LoanStatus {
        if self.is_overdue(now) {
            LoanStatus::Overdue
        } else {
            self.status
        }
    }

    /// Whole days left until the due date (negative once overdue)
    pub fn remaining_days(&self, now: DateTime<Utc>) -> i64 {
        (self.should_return_time.date_naive() - now.date_naive()).num_days()
    }

    pub fn view(&self, now: DateTime<Utc>) -> BorrowRecordView {
        BorrowRecordView {
            record_id: self.record_id,
            book_id: self.book_id.clone(),
            user_account: self.user_account.clone(),
            status: self.status as i16,
            status_text: self.display_status(now).label().to_string(),
            borrow_time: self.borrow_time.format(DATE_TIME_FORMAT).to_string(),
            should_return_time: self.should_return_time.format(DATE_FORMAT).to_string(),
            return_time: self
                .return_time
                .map(|t| t.format(DATE_TIME_FORMAT).to_string()),
            is_overdue: self.is_overdue(now),
        }
    }
}

/// Insert payload for a new loan
#[derive(Debug, Clone)]
pub struct NewBorrowRecord {
    pub book_id: String,
    pub user_account: String,
    pub borrow_time: DateTime<Utc>,
    pub should_return_time: DateTime<Utc>,
}

/// Loan joined with display fields for the staff listing
#[derive(Debug, Clone, FromRow)]
pub struct BorrowRecordDetails {
    #[sqlx(flatten)]
    pub record: BorrowRecord,
    pub book_title: String,
    pub nickname: String,
}

/// Loan joined with its book for a user's own listings
#[derive(Debug, Clone, FromRow)]
pub struct UserLoan {
    #[sqlx(flatten)]
    pub book: Book,
    #[sqlx(flatten)]
    pub record: BorrowRecord,
}

/// Borrow record as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecordView {
    pub record_id: i32,
    pub book_id: String,
    pub user_account: String,
    /// Stored status: 1 borrowed, 2 returned, 3 overdue
    pub status: i16,
    /// Human label, "overdue" for loans past their due date
    pub status_text: String,
    pub borrow_time: String,
    pub should_return_time: String,
    pub return_time: Option<String>,
    pub is_overdue: bool,
}

/// Staff listing entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordListEntry {
    #[serde(flatten)]
    pub record: BorrowRecordView,
    pub book_title: String,
    pub nickname: String,
}

impl RecordListEntry {
    pub fn new(details: BorrowRecordDetails, now: DateTime<Utc>) -> Self {
        Self {
            record: details.record.view(now),
            book_title: details.book_title,
            nickname: details.nickname,
        }
    }
}

/// Entry of a user's loan listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserLoanEntry {
    #[serde(flatten)]
    pub record: BorrowRecordView,
    pub book: Book,
    pub remaining_days: i64,
}

impl UserLoanEntry {
    pub fn new(loan: UserLoan, now: DateTime<Utc>) -> Self {
        Self {
            remaining_days: loan.record.remaining_days(now),
            record: loan.record.view(now),
            book: loan.book,
        }
    }
}

/// Borrow or return request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    #[serde(default)]
    pub user_account: String,
    #[serde(default)]
    pub book_id: String,
}

/// Staff loan listing query
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordListQuery {
    /// 1 on loan (default), 2 returned, 3 overdue
    pub status: Option<i16>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Per-user listing query
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub user_account: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}
