use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use crate::{auth::jwt::JwtKeys, error::AppError};

/// Identity taken from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Token part of `Bearer <token>`. The scheme is matched exactly.
pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::unauthorized("Missing or invalid Authorization header"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|_| {
            warn!("invalid or expired access token");
            AppError::unauthorized("Invalid or expired access token")
        })?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}
