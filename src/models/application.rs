//! Borrow application model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::{
    enums::{ApplicationStatus, Decision},
    loan::{BorrowRecordView, DATE_TIME_FORMAT},
};

/// Borrow application from database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BorrowApplication {
    pub application_id: i32,
    pub book_id: String,
    pub user_account: String,
    pub admin_account: String,
    pub status: ApplicationStatus,
    pub apply_time: DateTime<Utc>,
    pub process_time: Option<DateTime<Utc>>,
    pub user_remark: Option<String>,
    pub admin_remark: Option<String>,
}

impl BorrowApplication {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.application_id,
            book_id: self.book_id.clone(),
            user_account: self.user_account.clone(),
            admin_account: self.admin_account.clone(),
            status: self.status as i16,
            status_text: self.status.label().to_string(),
            apply_time: self.apply_time.format(DATE_TIME_FORMAT).to_string(),
            process_time: self
                .process_time
                .map(|t| t.format(DATE_TIME_FORMAT).to_string()),
            user_remark: self.user_remark.clone(),
            admin_remark: self.admin_remark.clone(),
        }
    }
}

/// Insert payload for a new application
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub book_id: String,
    pub user_account: String,
    pub admin_account: String,
    pub user_remark: Option<String>,
    pub apply_time: DateTime<Utc>,
}

/// Staff decision written back to an application
#[derive(Debug, Clone)]
pub struct ApplicationDecision {
    pub status: ApplicationStatus,
    pub admin_remark: Option<String>,
    pub process_time: DateTime<Utc>,
}

/// Application joined with display fields
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationDetails {
    #[sqlx(flatten)]
    pub application: BorrowApplication,
    pub book_title: String,
    pub user_nickname: String,
}

/// Which applications to list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationFilter {
    /// Applications from users assigned to this admin
    AssignedTo(String),
    /// A user's own applications
    SubmittedBy(String),
}

/// Application as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub application_id: i32,
    pub book_id: String,
    pub user_account: String,
    pub admin_account: String,
    /// 0 pending, 1 approved, 2 rejected
    pub status: i16,
    pub status_text: String,
    pub apply_time: String,
    pub process_time: Option<String>,
    pub user_remark: Option<String>,
    pub admin_remark: Option<String>,
}

/// Application listing entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListEntry {
    #[serde(flatten)]
    pub application: ApplicationView,
    pub book_title: String,
    pub user_nickname: String,
}

impl From<ApplicationDetails> for ApplicationListEntry {
    fn from(details: ApplicationDetails) -> Self {
        Self {
            application: details.application.view(),
            book_title: details.book_title,
            user_nickname: details.user_nickname,
        }
    }
}

/// Outcome of a staff decision
#[derive(Debug, Clone)]
pub struct ProcessedApplication {
    pub application: BorrowApplication,
    /// Loan created by an approval
    pub record: Option<super::loan::BorrowRecord>,
}

/// Submit application request
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[serde(default)]
    pub book_id: String,
    #[serde(default)]
    pub user_account: String,
    /// Approver; defaults to the user's assigned admin
    pub admin_account: Option<String>,
    pub user_remark: Option<String>,
    /// When present, the user's password is checked before accepting
    pub password: Option<String>,
}

/// Staff decision request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub decision: Decision,
    pub admin_remark: Option<String>,
}

/// Process response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub application: ApplicationView,
    /// Present when the approval created a loan
    pub record: Option<BorrowRecordView>,
}

/// Admin application listing query
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminApplicationsQuery {
    pub admin_account: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}
