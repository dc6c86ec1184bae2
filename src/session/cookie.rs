//! Session cookie naming, parsing and `Set-Cookie` construction.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};

/// Fixed session cookie name.
pub const SESSION_COOKIE_NAME: &str = "tollgate.session_token";
/// Name used when the app is served over HTTPS.
pub const SECURE_SESSION_COOKIE_NAME: &str = "__Secure-tollgate.session_token";

#[must_use]
pub const fn cookie_name(secure: bool) -> &'static str {
    if secure {
        SECURE_SESSION_COOKIE_NAME
    } else {
        SESSION_COOKIE_NAME
    }
}

/// Find a cookie value by name across every `Cookie` header.
#[must_use]
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
        .find(|val| !val.is_empty())
}

/// Raw session cookie value under either cookie name.
#[must_use]
pub fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    read_cookie(headers, SECURE_SESSION_COOKIE_NAME)
        .or_else(|| read_cookie(headers, SESSION_COOKIE_NAME))
}

/// Presence-only check; says nothing about validity.
#[must_use]
pub fn has_session_cookie(headers: &HeaderMap) -> bool {
    session_cookie_value(headers).is_some()
}

/// Session credential from `Authorization: Bearer` or the session cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    session_cookie_value(headers).map(str::to_string)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Build a `HttpOnly` session cookie.
///
/// # Errors
/// Returns an error if the value contains characters invalid in a header.
pub fn session_cookie(
    value: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = cookie_name(secure);
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build an expired cookie that clears the session in the browser.
///
/// # Errors
/// Returns an error if the header cannot be built.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = cookie_name(secure);
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
