//! Accounts repository for users and admins

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{unique_violation, AccountStore};
use crate::{
    error::AppResult,
    models::{
        enums::AccountKind,
        user::{Account, Admin, NewAdmin, NewUser, User},
    },
};

#[derive(Clone)]
pub struct AccountsRepository {
    pool: Pool<Postgres>,
}

impl AccountsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for AccountsRepository {
    async fn find(&self, kind: AccountKind, account: &str) -> AppResult<Option<Account>> {
        let found = match kind {
            AccountKind::User => sqlx::query_as::<_, User>(
                r#"
                SELECT user_account, user_password, nickname, status, admin_account
                FROM users WHERE user_account = $1
                "#,
            )
            .bind(account)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::User),
            AccountKind::Admin => sqlx::query_as::<_, Admin>(
                r#"
                SELECT admin_account, admin_password, admin_nickname
                FROM admins WHERE admin_account = $1
                "#,
            )
            .bind(account)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::Admin),
        };

        Ok(found)
    }

    async fn admin_accounts(&self) -> AppResult<Vec<String>> {
        let accounts = sqlx::query_scalar("SELECT admin_account FROM admins ORDER BY admin_account")
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_account, user_password, nickname, status, admin_account)
            VALUES ($1, $2, $3, 0, $4)
            RETURNING user_account, user_password, nickname, status, admin_account
            "#,
        )
        .bind(&user.user_account)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(&user.admin_account)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "account already registered"))
    }

    async fn create_admin(&self, admin: NewAdmin) -> AppResult<Admin> {
        sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (admin_account, admin_password, admin_nickname)
            VALUES ($1, $2, $3)
            RETURNING admin_account, admin_password, admin_nickname
            "#,
        )
        .bind(&admin.admin_account)
        .bind(&admin.password_hash)
        .bind(&admin.nickname)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "account already registered"))
    }
}
