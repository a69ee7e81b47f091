use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::JsonBody,
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, DeletedResponse, UpdateTodoRequest},
        repo_types::Todo,
        services::{self, parse_id},
    },
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_todo(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let todo = services::create(&state, user.id, payload).await?;
    info!(todo_id = %todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_todos(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Todo>>, AppError> {
    Ok(Json(services::list(&state, user.id).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(services::get(&state, user.id, id).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateTodoRequest>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(services::update(&state, user.id, id, payload).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let id = parse_id(&id)?;
    services::delete(&state, user.id, id).await?;
    info!(todo_id = %id, "todo deleted");
    Ok(Json(DeletedResponse { message: "Deleted" }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, Response},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{
        app::build_app,
        auth::{dto::RegisterRequest, services::register},
        state::AppState,
    };

    async fn access_token_for(state: &AppState, email: &str) -> String {
        let req = RegisterRequest {
            name: Some("User".into()),
            email: Some(email.into()),
            password: Some("pw".into()),
        };
        register(state, req).await.unwrap().access_token
    }

    async fn call(
        state: &AppState,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        build_app(state.clone())
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(res: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn todos_require_authentication() {
        let state = AppState::fake();
        assert_eq!(call(&state, "GET", "/api/todos", None, None).await.status(), 401);
        assert_eq!(
            call(&state, "POST", "/api/todos", Some("garbage"), Some(json!({"title": "x"}))).await.status(),
            401
        );
    }

    #[tokio::test]
    async fn owner_scoping_over_http() {
        let state = AppState::fake();
        let alice = access_token_for(&state, "alice@x.com").await;
        let bob = access_token_for(&state, "bob@x.com").await;

        let res = call(&state, "POST", "/api/todos", Some(&alice), Some(json!({"title": "milk"}))).await;
        assert_eq!(res.status(), 201);
        let todo = json_body(res).await;
        assert_eq!(todo["title"], "milk");
        assert_eq!(todo["completed"], false);
        let uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

        assert_eq!(call(&state, "GET", &uri, Some(&bob), None).await.status(), 404);
        assert_eq!(
            call(&state, "PUT", &uri, Some(&bob), Some(json!({"completed": true}))).await.status(),
            404
        );
        assert_eq!(call(&state, "DELETE", &uri, Some(&bob), None).await.status(), 404);
        let bobs = json_body(call(&state, "GET", "/api/todos", Some(&bob), None).await).await;
        assert_eq!(bobs, json!([]));

        assert_eq!(call(&state, "GET", &uri, Some(&alice), None).await.status(), 200);
        let res = call(&state, "PUT", &uri, Some(&alice), Some(json!({"completed": true}))).await;
        assert_eq!(res.status(), 200);
        assert_eq!(json_body(res).await["completed"], true);
        let res = call(&state, "DELETE", &uri, Some(&alice), None).await;
        assert_eq!(res.status(), 200);
        assert_eq!(json_body(res).await["message"], "Deleted");
        assert_eq!(call(&state, "GET", &uri, Some(&alice), None).await.status(), 404);
    }

    #[tokio::test]
    async fn missing_title_and_bad_ids() {
        let state = AppState::fake();
        let token = access_token_for(&state, "alice@x.com").await;

        let res = call(&state, "POST", "/api/todos", Some(&token), Some(json!({"completed": true}))).await;
        assert_eq!(res.status(), 400);
        assert_eq!(json_body(res).await["message"], "Title is required");

        let res = call(&state, "POST", "/api/todos", Some(&token), Some(json!({"title": 5}))).await;
        assert_eq!(res.status(), 400);
        assert!(json_body(res).await["message"].is_string());

        assert_eq!(call(&state, "GET", "/api/todos/not-a-uuid", Some(&token), None).await.status(), 404);
    }
}
