//! Refresh-token cookie helpers.

use std::time::Duration;

use axum::http::{header, HeaderMap};

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "jid";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// Refresh token from the request, ignoring an empty value.
pub fn refresh_token_from(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, REFRESH_COOKIE_NAME).filter(|v| !v.is_empty())
}

/// `Set-Cookie` value delivering a refresh token.
pub fn refresh_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        REFRESH_COOKIE_NAME,
        token,
        max_age.as_secs(),
        if secure { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value removing the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        REFRESH_COOKIE_NAME,
        if secure { "; Secure" } else { "" }
    )
}
