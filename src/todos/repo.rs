use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::todos::repo_types::{Todo, TodoPatch};

/// Todo persistence. Every lookup is keyed by `(id, owner)`, so a row owned
/// by someone else is indistinguishable from a missing one.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create(&self, owner: Uuid, title: &str, completed: bool) -> anyhow::Result<Todo>;
    /// Newest first.
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Todo>>;
    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>>;
    async fn update(&self, owner: Uuid, id: Uuid, patch: TodoPatch) -> anyhow::Result<Option<Todo>>;
    /// Returns whether a row was deleted.
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn create(&self, owner: Uuid, title: &str, completed: bool) -> anyhow::Result<Todo> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (user_id, title, completed)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, completed, created_at, updated_at
            "#,
        )
        .bind(owner)
        .bind(title)
        .bind(completed)
        .fetch_one(&self.db)
        .await
        .context("insert todo")?;
        Ok(todo)
    }

    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Todo>> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, completed, created_at, updated_at
            FROM todos
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list todos")?;
        Ok(rows)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, completed, created_at, updated_at
            FROM todos
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("get todo")?;
        Ok(todo)
    }

    async fn update(&self, owner: Uuid, id: Uuid, patch: TodoPatch) -> anyhow::Result<Option<Todo>> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET title = COALESCE($3, title),
                   completed = COALESCE($4, completed),
                   updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, completed, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(patch.title)
        .bind(patch.completed)
        .fetch_optional(&self.db)
        .await
        .context("update todo")?;
        Ok(todo)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete todo")?;
        Ok(res.rows_affected() > 0)
    }
}
