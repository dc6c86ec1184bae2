//! Password reset by emailed single-use token.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{
    AuthError,
    payload::Payload,
    types::{ForgotPasswordRequest, ResetPasswordRequest},
    utils::{hash_password, normalize_email, valid_password},
    verification::issue_email_token,
};
use crate::{
    api::{email::EmailMessage, state::AppState},
    gate::see_other,
    session::token::hash_token,
    storage::{TokenKind, TokenStore, UserStore},
};

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Reset email sent when the account exists"),
        (status = 303, description = "Form request; redirect to /login")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Payload<ForgotPasswordRequest>>,
) -> Response {
    // Every outcome answers alike so the endpoint cannot be used to probe accounts.
    let Some(payload) = payload else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let done = if payload.is_form() {
        see_other("/login")
    } else {
        StatusCode::NO_CONTENT.into_response()
    };
    let request = payload.into_inner();
    let email = normalize_email(&request.email);
    let user = match state.store().find_user_by_email(&email).await {
        Ok(Some(user)) if !user.banned => user,
        Ok(_) => {
            debug!("password reset requested for unknown or banned account");
            return done;
        }
        Err(err) => {
            error!("Failed to look up account for password reset: {err:#}");
            return done;
        }
    };

    match issue_email_token(&state, TokenKind::PasswordReset, user.id).await {
        Ok(token) => {
            let message = EmailMessage::reset_password(&user.email, state.config().base_url(), &token);
            if let Err(err) = state.email().send(&message) {
                error!("Failed to send password reset email: {err:#}");
            }
        }
        Err(err) => error!("Failed to create password reset token: {err:#}"),
    }
    done
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password changed; all sessions revoked"),
        (status = 303, description = "Form reset; redirect to /login"),
        (status = 400, description = "Invalid/expired token or invalid password", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Payload<ResetPasswordRequest>>,
) -> Result<Response, AuthError> {
    let Some(payload) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };
    let from_form = payload.is_form();
    let request = payload.into_inner();
    if !valid_password(&request.password) {
        return Err(AuthError::BadRequest("Password must be 8 to 128 characters"));
    }
    let token = request.token.trim();
    if token.is_empty() {
        return Err(AuthError::BadRequest("Missing token"));
    }

    let Some(user_id) = state
        .store()
        .consume_token(TokenKind::PasswordReset, &hash_token(token))
        .await?
    else {
        return Err(AuthError::BadRequest("Invalid token"));
    };

    let password_hash = hash_password(request.password).await?;
    if !state.store().set_password_hash(user_id, &password_hash).await? {
        return Err(AuthError::BadRequest("Invalid token"));
    }
    // The reset link proves control of the mailbox.
    state.store().mark_email_verified(user_id).await?;
    let revoked = state.resolver().revoke_user(user_id).await?;
    info!(user_id = %user_id, revoked, "password reset");
    if from_form {
        return Ok(see_other("/login"));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
