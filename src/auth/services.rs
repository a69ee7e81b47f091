//! Register / login / refresh / logout / me.
//!
//! A refresh token is *active* while it sits in its user's stored set. Refresh
//! rotates it out; logout or reuse detection revokes it. Once out of the set
//! it never comes back, and presenting it again is treated as theft: every
//! session of that user is revoked.

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest},
        password::{hash_password, verify_password},
        repo::CreateUserError,
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Outcome of register/login. The refresh token goes into the cookie only.
#[derive(Debug)]
pub struct Session {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Outcome of a successful rotation.
#[derive(Debug)]
pub struct Rotated {
    pub access_token: String,
    pub refresh_token: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `Some` only for a present, non-blank value.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// Signs a pair and records the refresh token as active.
async fn issue_session(state: &AppState, user: User) -> Result<Session, AppError> {
    let access_token = state.keys.sign_access(&user).context("sign access token")?;
    let refresh_token = state.keys.sign_refresh(user.id).context("sign refresh token")?;
    state.users.add_refresh_token(user.id, &refresh_token).await?;
    Ok(Session {
        user: user.into(),
        access_token,
        refresh_token,
    })
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<Session, AppError> {
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), present(req.password))
    else {
        return Err(AppError::validation("Name, email and password are required"));
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&password)?;
    let user = state
        .users
        .create(NewUser {
            name: name.trim().to_owned(),
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            CreateUserError::DuplicateEmail => AppError::conflict("Email already registered"),
            CreateUserError::Store(e) => AppError::Internal(e),
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_session(state, user).await
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<Session, AppError> {
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(&email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    info!(user_id = %user.id, "user logged in");
    issue_session(state, user).await
}

pub async fn refresh(state: &AppState, presented: Option<&str>) -> Result<Rotated, AppError> {
    let token = presented.ok_or_else(|| AppError::unauthorized("No refresh token"))?;
    let claims = state
        .keys
        .verify_refresh(token)
        .map_err(|_| AppError::unauthorized("Invalid refresh token"))?;

    let Some(user) = state.users.find_by_id(claims.sub).await? else {
        warn!(user_id = %claims.sub, "refresh for unknown user");
        return Err(AppError::unauthorized("User not found"));
    };

    let new_refresh = state.keys.sign_refresh(user.id).context("sign refresh token")?;
    if !state
        .users
        .rotate_refresh_token(user.id, token, &new_refresh)
        .await?
    {
        let revoked = state.users.clear_refresh_tokens(user.id).await?;
        warn!(user_id = %user.id, revoked, "refresh token reuse detected; all sessions revoked");
        return Err(AppError::unauthorized("Refresh token reuse detected"));
    }

    let access_token = state.keys.sign_access(&user).context("sign access token")?;
    info!(user_id = %user.id, "refresh token rotated");
    Ok(Rotated {
        access_token,
        refresh_token: new_refresh,
    })
}

/// Never fails; problems are logged and the caller still clears the cookie.
pub async fn logout(state: &AppState, presented: Option<&str>) {
    let Some(token) = presented else { return };
    let Ok(claims) = state.keys.verify_refresh(token) else {
        return;
    };
    match state.users.remove_refresh_token(claims.sub, token).await {
        Ok(true) => info!(user_id = %claims.sub, "session logged out"),
        Ok(false) => {}
        Err(e) => warn!(error = ?e, user_id = %claims.sub, "logout could not revoke token"),
    }
}

pub async fn me(state: &AppState, user_id: Uuid) -> Result<PublicUser, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::not_found("User not found"))
}
