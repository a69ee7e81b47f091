use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, UpdateTodoRequest},
        repo_types::{Todo, TodoPatch},
    },
};

const NOT_FOUND: &str = "Todo not found";

/// Path ids that are not UUIDs can't match any todo.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(NOT_FOUND))
}

fn require_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    Ok(title.to_owned())
}

pub async fn create(state: &AppState, owner: Uuid, req: CreateTodoRequest) -> Result<Todo, AppError> {
    let title = require_title(req.title.as_deref().unwrap_or_default())?;
    Ok(state.todos.create(owner, &title, req.completed).await?)
}

pub async fn list(state: &AppState, owner: Uuid) -> Result<Vec<Todo>, AppError> {
    Ok(state.todos.list_by_owner(owner).await?)
}

pub async fn get(state: &AppState, owner: Uuid, id: Uuid) -> Result<Todo, AppError> {
    state
        .todos
        .get(owner, id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))
}

pub async fn update(
    state: &AppState,
    owner: Uuid,
    id: Uuid,
    req: UpdateTodoRequest,
) -> Result<Todo, AppError> {
    let patch = TodoPatch {
        title: req.title.as_deref().map(require_title).transpose()?,
        completed: req.completed,
    };
    state
        .todos
        .update(owner, id, patch)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))
}

pub async fn delete(state: &AppState, owner: Uuid, id: Uuid) -> Result<(), AppError> {
    if state.todos.delete(owner, id).await? {
        Ok(())
    } else {
        Err(AppError::not_found(NOT_FOUND))
    }
}
