use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::todos::{
    repo::TodoStore,
    repo_types::{Todo, TodoPatch},
};

/// Process-local `TodoStore`, kept in insertion order.
#[derive(Default)]
pub struct MemoryTodoStore {
    rows: Mutex<Vec<Todo>>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn create(&self, owner: Uuid, title: &str, completed: bool) -> anyhow::Result<Todo> {
        let now = OffsetDateTime::now_utc();
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id: owner,
            title: title.to_owned(),
            completed,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().await.push(todo.clone());
        Ok(todo)
    }

    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Todo>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().rev().filter(|t| t.user_id == owner).cloned().collect())
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|t| t.id == id && t.user_id == owner).cloned())
    }

    async fn update(&self, owner: Uuid, id: Uuid, patch: TodoPatch) -> anyhow::Result<Option<Todo>> {
        let mut rows = self.rows.lock().await;
        let Some(todo) = rows.iter_mut().find(|t| t.id == id && t.user_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            todo.title = title;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        todo.updated_at = OffsetDateTime::now_utc();
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(rows.len() != before)
    }
}
