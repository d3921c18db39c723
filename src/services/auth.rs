//! Account registration and credential checks

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::seq::SliceRandom;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{AccountKind, UserStatus},
        user::{Account, AccountInfo, NewAdmin, NewUser, RegisterRequest},
    },
    repository::AccountStore,
};

const INVALID_CREDENTIALS: &str = "Invalid account or password";

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
}

impl AuthService {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Register a user or an admin.
    ///
    /// A new user is assigned to a randomly picked existing admin, who will
    /// handle their borrow applications.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AccountInfo> {
        request.validate()?;

        let account = request.email.trim().to_string();
        let kind = AccountKind::from_admin_flag(request.is_admin);

        if self.accounts.find(kind, &account).await?.is_some() {
            tracing::debug!("Registration rejected, {} already exists", account);
            return Err(AppError::conflict("account already registered"));
        }

        let password_hash = hash_password(&request.password)?;

        let created = match kind {
            AccountKind::Admin => Account::Admin(
                self.accounts
                    .create_admin(NewAdmin {
                        admin_account: account,
                        password_hash,
                        nickname: request.username,
                    })
                    .await?,
            ),
            AccountKind::User => {
                let admins = self.accounts.admin_accounts().await?;
                let admin_account = admins
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .ok_or_else(|| AppError::conflict("no administrator available"))?;

                Account::User(
                    self.accounts
                        .create_user(NewUser {
                            user_account: account,
                            password_hash,
                            nickname: request.username,
                            admin_account,
                        })
                        .await?,
                )
            }
        };

        let info = AccountInfo::from(created);
        tracing::info!("Registered {:?} account {}", info.kind, info.account);
        Ok(info)
    }

    /// Check credentials and return the account without its hash
    pub async fn login(&self, kind: AccountKind, account: &str, password: &str) -> AppResult<AccountInfo> {
        let found = self
            .accounts
            .find(kind, account.trim())
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if let Account::User(user) = &found {
            if user.status() == UserStatus::Disabled {
                return Err(AppError::Authentication("Account is disabled".to_string()));
            }
        }

        if !verify_password(found.password_hash(), password)? {
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        Ok(AccountInfo::from(found))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn register_request(email: &str, is_admin: bool) -> RegisterRequest {
        RegisterRequest {
            username: "Someone".to_string(),
            email: email.to_string(),
            password: "secret-pass".to_string(),
            is_admin,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password(&hash, "hunter22").unwrap());
        assert!(!verify_password(&hash, "hunter23").unwrap());
        assert!(verify_password("not a hash", "x").is_err());
    }

    #[tokio::test]
    async fn test_user_registration_needs_an_admin() {
        let auth = AuthService::new(Arc::new(MemoryStore::new()));
        let err = auth
            .register(register_request("reader@example.org", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "no administrator available"));
    }

    #[tokio::test]
    async fn test_register_assigns_admin_and_rejects_duplicates() {
        let auth = AuthService::new(Arc::new(MemoryStore::new()));
        auth.register(register_request("staff@example.org", true)).await.unwrap();

        let user = auth
            .register(register_request("reader@example.org", false))
            .await
            .unwrap();
        assert_eq!(user.kind, AccountKind::User);
        assert_eq!(user.admin_account.as_deref(), Some("staff@example.org"));

        let err = auth
            .register(register_request("reader@example.org", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login() {
        let store = MemoryStore::new();
        let auth = AuthService::new(Arc::new(store.clone()));
        auth.register(register_request("staff@example.org", true)).await.unwrap();
        auth.register(register_request("reader@example.org", false)).await.unwrap();

        let info = auth
            .login(AccountKind::User, "reader@example.org", "secret-pass")
            .await
            .unwrap();
        assert_eq!(info.account, "reader@example.org");

        let wrong = auth.login(AccountKind::User, "reader@example.org", "nope").await;
        assert!(matches!(wrong, Err(AppError::Authentication(_))));

        // an admin account is not a user account
        let kind_mismatch = auth
            .login(AccountKind::User, "staff@example.org", "secret-pass")
            .await;
        assert!(matches!(kind_mismatch, Err(AppError::Authentication(_))));

        store.set_user_status("reader@example.org", 1).await.unwrap();
        let disabled = auth
            .login(AccountKind::User, "reader@example.org", "secret-pass")
            .await;
        assert!(matches!(disabled, Err(AppError::Authentication(msg)) if msg == "Account is disabled"));
    }
}
