//! Status enums for loans, applications and accounts
//!
//! Loan and application statuses are stored as SMALLINT. Their numeric
//! ranges overlap (`1` is "borrowed" for a loan and "approved" for an
//! application), so they are deliberately separate types.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// SQLx conversion for `#[repr(i16)]` status enums stored as SMALLINT
macro_rules! smallint_status {
    ($ty:ty) => {
        impl sqlx::Type<Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <i16 as sqlx::Type<Postgres>>::type_info()
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let v: i16 = Decode::<Postgres>::decode(value)?;
                <$ty>::try_from(v).map_err(|e| e.to_string().into())
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <i16 as Encode<Postgres>>::encode_by_ref(&(*self as i16), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Status of a borrow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum LoanStatus {
    Borrowed = 1,
    Returned = 2,
    Overdue = 3,
}

impl LoanStatus {
    pub fn label(self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "on loan",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
        }
    }

    /// Whether the book is still out with the borrower
    pub fn is_active(self) -> bool {
        matches!(self, LoanStatus::Borrowed | LoanStatus::Overdue)
    }

    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Borrowed, LoanStatus::Returned)
                | (LoanStatus::Borrowed, LoanStatus::Overdue)
                | (LoanStatus::Overdue, LoanStatus::Returned)
        )
    }
}

impl TryFrom<i16> for LoanStatus {
    type Error = AppError;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(LoanStatus::Borrowed),
            2 => Ok(LoanStatus::Returned),
            3 => Ok(LoanStatus::Overdue),
            other => Err(AppError::Validation(format!("Invalid loan status: {}", other))),
        }
    }
}

impl From<LoanStatus> for i16 {
    fn from(s: LoanStatus) -> Self {
        s as i16
    }
}

smallint_status!(LoanStatus);

/// Status filter for the staff loan listing.
///
/// `Overdue` is derived at read time: still borrowed and past the due time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanStatusFilter {
    OnLoan,
    Returned,
    Overdue,
}

impl TryFrom<i16> for LoanStatusFilter {
    type Error = AppError;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        Ok(match LoanStatus::try_from(v)? {
            LoanStatus::Borrowed => LoanStatusFilter::OnLoan,
            LoanStatus::Returned => LoanStatusFilter::Returned,
            LoanStatus::Overdue => LoanStatusFilter::Overdue,
        })
    }
}

impl Default for LoanStatusFilter {
    fn default() -> Self {
        LoanStatusFilter::OnLoan
    }
}

/// Which of a user's loans to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanScope {
    Active,
    All,
}

// ---------------------------------------------------------------------------
// ApplicationStatus
// ---------------------------------------------------------------------------

/// Status of a borrow application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum ApplicationStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl ApplicationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Apply a staff decision. Only pending applications can be decided.
    pub fn decide(self, decision: Decision) -> AppResult<ApplicationStatus> {
        match self {
            ApplicationStatus::Pending => Ok(match decision {
                Decision::Approve => ApplicationStatus::Approved,
                Decision::Reject => ApplicationStatus::Rejected,
            }),
            _ => Err(AppError::conflict("application already processed")),
        }
    }
}

impl TryFrom<i16> for ApplicationStatus {
    type Error = AppError;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ApplicationStatus::Pending),
            1 => Ok(ApplicationStatus::Approved),
            2 => Ok(ApplicationStatus::Rejected),
            other => Err(AppError::Validation(format!("Invalid application status: {}", other))),
        }
    }
}

impl From<ApplicationStatus> for i16 {
    fn from(s: ApplicationStatus) -> Self {
        s as i16
    }
}

smallint_status!(ApplicationStatus);

/// Staff decision on a pending application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Account table selector. Each kind maps to fixed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Admin,
}

impl AccountKind {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            AccountKind::Admin
        } else {
            AccountKind::User
        }
    }
}

/// User account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum UserStatus {
    Active = 0,
    Disabled = 1,
}

impl From<i16> for UserStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => UserStatus::Disabled,
            _ => UserStatus::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_status_round_trip() {
        assert_eq!(LoanStatus::try_from(1).unwrap(), LoanStatus::Borrowed);
        assert_eq!(LoanStatus::try_from(3).unwrap(), LoanStatus::Overdue);
        assert_eq!(i16::from(LoanStatus::Returned), 2);
        assert!(LoanStatus::try_from(0).is_err());
    }

    #[test]
    fn test_status_numbers_are_independent() {
        assert_eq!(LoanStatus::try_from(1).unwrap().label(), "on loan");
        assert_eq!(ApplicationStatus::try_from(1).unwrap().label(), "approved");
        assert_eq!(ApplicationStatus::try_from(0).unwrap().label(), "pending");
        assert!(ApplicationStatus::try_from(3).is_err());
    }

    #[test]
    fn test_loan_transitions() {
        assert!(LoanStatus::Borrowed.can_transition_to(LoanStatus::Returned));
        assert!(LoanStatus::Overdue.can_transition_to(LoanStatus::Returned));
        assert!(!LoanStatus::Returned.can_transition_to(LoanStatus::Returned));
        assert!(!LoanStatus::Returned.can_transition_to(LoanStatus::Borrowed));
    }

    #[test]
    fn test_application_decisions() {
        assert_eq!(
            ApplicationStatus::Pending.decide(Decision::Approve).unwrap(),
            ApplicationStatus::Approved
        );
        assert_eq!(
            ApplicationStatus::Pending.decide(Decision::Reject).unwrap(),
            ApplicationStatus::Rejected
        );
        assert!(matches!(
            ApplicationStatus::Approved.decide(Decision::Reject),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(LoanStatusFilter::try_from(3).unwrap(), LoanStatusFilter::Overdue);
        assert_eq!(LoanStatusFilter::default(), LoanStatusFilter::OnLoan);
        assert!(LoanStatusFilter::try_from(9).is_err());
    }
}
