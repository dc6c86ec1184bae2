//! Sign-in, sign-out and session introspection.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    AuthError,
    payload::{Payload, is_form_post},
    types::{SessionResponse, SignInRequest},
    utils::{normalize_email, verify_password, verify_unknown_account},
};
use crate::{
    api::state::AppState,
    gate::{sanitize, see_other},
    session::{
        CurrentSession,
        cookie::{clear_session_cookie, extract_session_token, session_cookie},
    },
    storage::UserStore,
    users::User,
};

#[utoipa::path(
    post,
    path = "/api/auth/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SessionResponse),
        (status = 303, description = "Form sign-in; redirect to the sanitized callbackUrl"),
        (status = 401, description = "Invalid email or password", body = String),
        (status = 403, description = "Account banned or email not verified", body = String),
    ),
    tag = "auth"
)]
pub async fn sign_in(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Payload<SignInRequest>>,
) -> Result<Response, AuthError> {
    let Some(payload) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };
    let from_form = payload.is_form();
    let request = payload.into_inner();
    let email = normalize_email(&request.email);

    // Unknown email and wrong password share one answer and one argon2 run.
    let Some(user) = state.store().find_user_by_email(&email).await? else {
        verify_unknown_account(request.password).await?;
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(request.password, user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials);
    }
    if user.banned {
        return Err(AuthError::Forbidden("Account is banned"));
    }
    if state.config().require_email_verification() && !user.email_verified {
        return Err(AuthError::Forbidden("Email not verified"));
    }

    let issued = state.resolver().issue(user.id).await?;
    let cookie = session_cookie(
        &issued.cookie_value,
        state.config().session_ttl_seconds(),
        state.config().session_cookie_secure(),
    )
    .map_err(|err| AuthError::Internal(err.into()))?;
    info!(user_id = %user.id, "user signed in");

    if from_form {
        let mut redirect = see_other(&sanitize(request.callback_url.as_deref()));
        redirect.headers_mut().insert(SET_COOKIE, cookie);
        return Ok(redirect);
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    let body = SessionResponse {
        user: User::from(user),
        session: issued.session,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/sign-out",
    responses(
        (status = 204, description = "Session cleared"),
        (status = 303, description = "Form sign-out; session cleared, redirect to /")
    ),
    tag = "auth"
)]
pub async fn sign_out(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    if let Some(token_hash) =
        extract_session_token(&headers).and_then(|signed| state.resolver().token_hash_from(&signed))
    {
        if let Err(err) = state.resolver().revoke(&token_hash).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response = if is_form_post(&headers) {
        see_other("/")
    } else {
        StatusCode::NO_CONTENT.into_response()
    };
    if let Ok(cookie) = clear_session_cookie(state.config().session_cookie_secure()) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(CurrentSession(resolved): CurrentSession) -> Response {
    match resolved {
        Some(resolved) => {
            let body = SessionResponse {
                user: resolved.user,
                session: resolved.session,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
