use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        cookie::{clear_refresh_cookie, refresh_cookie, refresh_token_from},
        dto::{AccessTokenResponse, AuthResponse, LoginRequest, MeResponse, MessageResponse, RegisterRequest},
        extractors::AuthUser,
        services,
    },
    error::AppError,
    extract::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

fn set_refresh_cookie(state: &AppState, token: &str) -> [(axum::http::HeaderName, String); 1] {
    let cookie = refresh_cookie(
        token,
        state.config.jwt.refresh_ttl,
        state.config.cookie_secure,
    );
    [(SET_COOKIE, cookie)]
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        set_refresh_cookie(&state, &session.refresh_token),
        Json(AuthResponse {
            user: session.user,
            access_token: session.access_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = services::login(&state, payload).await?;
    Ok((
        set_refresh_cookie(&state, &session.refresh_token),
        Json(AuthResponse {
            user: session.user,
            access_token: session.access_token,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let rotated = services::refresh(&state, refresh_token_from(&headers)).await?;
    Ok((
        set_refresh_cookie(&state, &rotated.refresh_token),
        Json(AccessTokenResponse {
            access_token: rotated.access_token,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    services::logout(&state, refresh_token_from(&headers)).await;
    (
        [(SET_COOKIE, clear_refresh_cookie(state.config.cookie_secure))],
        Json(MessageResponse { message: "Logged out" }),
    )
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = services::me(&state, user.id).await?;
    Ok(Json(MeResponse { user }))
}
