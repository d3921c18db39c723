//! User and admin account models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{AccountKind, UserStatus};

/// Reader account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_account: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub user_password: String,
    pub nickname: String,
    pub status: i16,
    /// Staff member who handles this user's applications
    pub admin_account: String,
}

impl User {
    pub fn status(&self) -> UserStatus {
        UserStatus::from(self.status)
    }
}

/// Staff account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub admin_account: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
    pub admin_nickname: String,
}

/// Either kind of account, as loaded for authentication
#[derive(Debug, Clone)]
pub enum Account {
    User(User),
    Admin(Admin),
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        match self {
            Account::User(_) => AccountKind::User,
            Account::Admin(_) => AccountKind::Admin,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Account::User(u) => &u.user_password,
            Account::Admin(a) => &a.admin_password,
        }
    }
}

/// Account as returned to clients, without credential hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub account: String,
    pub nickname: String,
    pub kind: AccountKind,
    /// Assigned administrator (users only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_account: Option<String>,
}

impl From<Account> for AccountInfo {
    fn from(account: Account) -> Self {
        match account {
            Account::User(u) => AccountInfo {
                account: u.user_account,
                nickname: u.nickname,
                kind: AccountKind::User,
                admin_account: Some(u.admin_account),
            },
            Account::Admin(a) => AccountInfo {
                account: a.admin_account,
                nickname: a.admin_nickname,
                kind: AccountKind::Admin,
                admin_account: None,
            },
        }
    }
}

/// Insert payload for a user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_account: String,
    pub password_hash: String,
    pub nickname: String,
    pub admin_account: String,
}

/// Insert payload for an admin row
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub admin_account: String,
    pub password_hash: String,
    pub nickname: String,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    /// Account identifier (login)
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}
