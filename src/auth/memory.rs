use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::{
    repo::{CreateUserError, UserStore},
    repo_types::{NewUser, StoredRefreshToken, User},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    refresh_tokens: Vec<StoredRefreshToken>,
}

/// Process-local `UserStore`. Each call takes the lock once, which gives the
/// same per-operation atomicity the SQL store has.
#[derive(Default)]
pub struct MemoryUserStore {
    tables: Mutex<Tables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(CreateUserError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn refresh_tokens(&self, user_id: Uuid) -> anyhow::Result<Vec<StoredRefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_refresh_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        let mut tables = self.tables.lock().await;
        anyhow::ensure!(
            !tables.refresh_tokens.iter().any(|t| t.token == token),
            "refresh token already stored"
        );
        tables.refresh_tokens.push(StoredRefreshToken {
            token: token.to_owned(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    async fn remove_refresh_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|t| !(t.user_id == user_id && t.token == token));
        Ok(tables.refresh_tokens.len() != before)
    }

    async fn rotate_refresh_token(&self, user_id: Uuid, old: &str, new: &str) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(pos) = tables
            .refresh_tokens
            .iter()
            .position(|t| t.user_id == user_id && t.token == old)
        else {
            return Ok(false);
        };
        tables.refresh_tokens.remove(pos);
        tables.refresh_tokens.push(StoredRefreshToken {
            token: new.to_owned(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(true)
    }

    async fn clear_refresh_tokens(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|t| t.user_id != user_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Alice".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.unwrap();
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, CreateUserError::DuplicateEmail));
    }

    #[tokio::test]
    async fn rotate_only_replaces_a_present_token() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.unwrap();
        store.add_refresh_token(user.id, "t1").await.unwrap();
        store.add_refresh_token(user.id, "t2").await.unwrap();

        assert!(store.rotate_refresh_token(user.id, "t1", "t3").await.unwrap());
        assert!(!store.rotate_refresh_token(user.id, "t1", "t4").await.unwrap());

        let tokens: Vec<String> = store
            .refresh_tokens(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(tokens, vec!["t2", "t3"]);
    }

    #[tokio::test]
    async fn clear_only_touches_one_user() {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("a@x.com")).await.unwrap();
        let bob = store.create(new_user("b@x.com")).await.unwrap();
        store.add_refresh_token(alice.id, "a1").await.unwrap();
        store.add_refresh_token(alice.id, "a2").await.unwrap();
        store.add_refresh_token(bob.id, "b1").await.unwrap();

        assert_eq!(store.clear_refresh_tokens(alice.id).await.unwrap(), 2);
        assert!(store.refresh_tokens(alice.id).await.unwrap().is_empty());
        assert_eq!(store.refresh_tokens(bob.id).await.unwrap().len(), 1);
    }
}
