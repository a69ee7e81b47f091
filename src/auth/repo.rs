use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg(test)]
use crate::auth::repo_types::StoredRefreshToken;
use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Persistence for users and their outstanding refresh tokens.
///
/// Emails are passed in already normalised (trimmed, lower-case).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> Result<User, CreateUserError>;

    /// Currently valid refresh tokens, oldest first.
    #[cfg(test)]
    async fn refresh_tokens(&self, user_id: Uuid) -> anyhow::Result<Vec<StoredRefreshToken>>;
    async fn add_refresh_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()>;
    /// Returns whether the token was present.
    async fn remove_refresh_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<bool>;
    /// Replaces `old` with `new` if `old` is still present. Returns `false`
    /// and leaves the set untouched otherwise.
    async fn rotate_refresh_token(&self, user_id: Uuid, old: &str, new: &str) -> anyhow::Result<bool>;
    /// Revokes every session of the user; returns how many tokens were dropped.
    async fn clear_refresh_tokens(&self, user_id: Uuid) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CreateUserError::DuplicateEmail)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    #[cfg(test)]
    async fn refresh_tokens(&self, user_id: Uuid) -> anyhow::Result<Vec<StoredRefreshToken>> {
        let rows = sqlx::query_as::<_, StoredRefreshToken>(
            r#"
            SELECT token, user_id, created_at
              FROM refresh_tokens
             WHERE user_id = $1
             ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list refresh tokens")?;
        Ok(rows)
    }

    async fn add_refresh_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO refresh_tokens (token, user_id) VALUES ($1, $2)")
            .bind(token)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("insert refresh token")?;
        Ok(())
    }

    async fn remove_refresh_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1 AND user_id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete refresh token")?;
        Ok(res.rows_affected() > 0)
    }

    async fn rotate_refresh_token(&self, user_id: Uuid, old: &str, new: &str) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let removed = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1 AND user_id = $2")
            .bind(old)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("delete rotated refresh token")?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO refresh_tokens (token, user_id) VALUES ($1, $2)")
            .bind(new)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("insert rotated refresh token")?;

        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    async fn clear_refresh_tokens(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("clear refresh tokens")?;
        Ok(res.rows_affected())
    }
}
