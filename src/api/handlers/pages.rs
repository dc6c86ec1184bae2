//! Server-rendered page shells.
//!
//! Protected pages re-check the session against the store (the edge gate only
//! saw a cookie) and send anonymous visitors to sign-in. `/admin` answers 404
//! to signed-in non-admins so the page's existence is not confirmed.

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode, Uri, header::SET_COOKIE},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    gate::{callback::CALLBACK_PARAM, sanitize, see_other, sign_in_redirect},
    session::{
        CurrentSession, ResolvedSession,
        cookie::{SECURE_SESSION_COOKIE_NAME, clear_session_cookie, has_session_cookie, read_cookie},
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
    token: Option<String>,
}

/// Escape text for HTML bodies and attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title} · {name}</title></head>\n<body>\n<main>\n<h1>{title}</h1>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape_html(title),
        name = env!("CARGO_PKG_NAME"),
    ))
}

fn require_session(
    session: Option<ResolvedSession>,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<ResolvedSession, Response> {
    session.ok_or_else(|| {
        let mut redirect = see_other(&sign_in_redirect(uri.path(), uri.query()));
        // A cookie that no longer resolves would keep the guest-only pages
        // unreachable through the edge gate; drop it on the way to sign-in.
        if has_session_cookie(headers) {
            let secure = read_cookie(headers, SECURE_SESSION_COOKIE_NAME).is_some();
            if let Ok(cookie) = clear_session_cookie(secure) {
                redirect.headers_mut().insert(SET_COOKIE, cookie);
            }
        }
        redirect
    })
}

fn greeting(session: &ResolvedSession) -> String {
    format!("<p>Signed in as {}</p>", escape_html(&session.user.name))
}

pub async fn home(CurrentSession(session): CurrentSession) -> Html<String> {
    let body = match session {
        Some(session) => format!(
            "{}\n<nav><a href=\"/dashboard\">Dashboard</a> <a href=\"/settings\">Settings</a></nav>",
            greeting(&session)
        ),
        None => "<nav><a href=\"/login\">Sign in</a> <a href=\"/register\">Create account</a></nav>"
            .to_string(),
    };
    layout("Welcome", &body)
}

pub async fn login(Query(query): Query<PageQuery>) -> Html<String> {
    let callback = sanitize(query.callback_url.as_deref());
    layout(
        "Sign in",
        &format!(
            "<form method=\"post\" action=\"/api/auth/sign-in\" data-callback=\"{callback}\">\n\
             <input type=\"hidden\" name=\"{CALLBACK_PARAM}\" value=\"{callback}\">\n\
             <input type=\"email\" name=\"email\" required>\n\
             <input type=\"password\" name=\"password\" required>\n\
             <button type=\"submit\">Sign in</button>\n</form>\n\
             <a href=\"/forgot-password\">Forgot password?</a>",
            callback = escape_html(&callback),
        ),
    )
}

pub async fn register() -> Html<String> {
    layout(
        "Create account",
        "<form method=\"post\" action=\"/api/auth/sign-up\">\n\
         <input type=\"text\" name=\"name\" required>\n\
         <input type=\"email\" name=\"email\" required>\n\
         <input type=\"password\" name=\"password\" minlength=\"8\" required>\n\
         <button type=\"submit\">Create account</button>\n</form>",
    )
}

pub async fn forgot_password() -> Html<String> {
    layout(
        "Forgot password",
        "<form method=\"post\" action=\"/api/auth/forgot-password\">\n\
         <input type=\"email\" name=\"email\" required>\n\
         <button type=\"submit\">Send reset link</button>\n</form>",
    )
}

pub async fn reset_password(Query(query): Query<PageQuery>) -> Html<String> {
    let token = escape_html(query.token.as_deref().unwrap_or_default());
    layout(
        "Reset password",
        &format!(
            "<form method=\"post\" action=\"/api/auth/reset-password\">\n\
             <input type=\"hidden\" name=\"token\" value=\"{token}\">\n\
             <input type=\"password\" name=\"password\" minlength=\"8\" required>\n\
             <button type=\"submit\">Set new password</button>\n</form>"
        ),
    )
}

pub async fn verify_email(Query(query): Query<PageQuery>) -> Html<String> {
    let token = escape_html(query.token.as_deref().unwrap_or_default());
    layout(
        "Verify email",
        &format!(
            "<form method=\"post\" action=\"/api/auth/verify-email\">\n\
             <input type=\"hidden\" name=\"token\" value=\"{token}\">\n\
             <button type=\"submit\">Verify my email</button>\n</form>"
        ),
    )
}

pub async fn dashboard(
    CurrentSession(session): CurrentSession,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    match require_session(session, &uri, &headers) {
        Ok(session) => layout(
            "Dashboard",
            &format!(
                "{}\n<nav><a href=\"/dashboard/users\">Users</a> <a href=\"/settings\">Settings</a></nav>",
                greeting(&session)
            ),
        )
        .into_response(),
        Err(redirect) => redirect,
    }
}

pub async fn dashboard_users(
    CurrentSession(session): CurrentSession,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    match require_session(session, &uri, &headers) {
        // The list itself is fetched client-side through `user.list`.
        Ok(session) => layout(
            "Users",
            &format!("{}\n<section id=\"users\" data-procedure=\"user.list\"></section>", greeting(&session)),
        )
        .into_response(),
        Err(redirect) => redirect,
    }
}

pub async fn settings(
    CurrentSession(session): CurrentSession,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    match require_session(session, &uri, &headers) {
        Ok(session) => layout(
            "Settings",
            &format!(
                "{}\n<p>Email: {}</p>\n<form method=\"post\" action=\"/api/auth/sign-out\"><button type=\"submit\">Sign out</button></form>",
                greeting(&session),
                escape_html(&session.user.email),
            ),
        )
        .into_response(),
        Err(redirect) => redirect,
    }
}

pub async fn admin(
    CurrentSession(session): CurrentSession,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    match require_session(session, &uri, &headers) {
        Ok(session) if session.is_admin() => layout(
            "Admin",
            &format!(
                "{}\n<section id=\"admin-users\" data-procedure=\"admin.listUsers\"></section>",
                greeting(&session)
            ),
        )
        .into_response(),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(redirect) => redirect,
    }
}
