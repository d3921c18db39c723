//! Data models for the library server

pub mod application;
pub mod book;
pub mod enums;
pub mod loan;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use application::{ApplicationDetails, ApplicationFilter, BorrowApplication};
pub use book::Book;
pub use enums::{AccountKind, ApplicationStatus, Decision, LoanScope, LoanStatus, LoanStatusFilter};
pub use loan::{BorrowRecord, BorrowRecordDetails, UserLoan};
pub use pagination::{PageRequest, Paginated, Pagination};
pub use user::{Account, AccountInfo, Admin, User};
