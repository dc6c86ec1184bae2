//! Email verification tokens and endpoint.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{AuthError, payload::Payload, types::VerifyEmailRequest};
use crate::{
    api::state::AppState,
    gate::see_other,
    session::token::{generate_token, hash_token},
    storage::{TokenKind, TokenStore, UserStore},
};

/// Create a single-use token and return the raw value for the email link.
pub(super) async fn issue_email_token(
    state: &AppState,
    kind: TokenKind,
    user_id: Uuid,
) -> Result<String> {
    let token = generate_token()?;
    state
        .store()
        .insert_token(
            kind,
            user_id,
            &hash_token(&token),
            state.config().token_ttl_seconds(),
        )
        .await
        .with_context(|| format!("failed to store {} token", kind.as_str()))?;
    Ok(token)
}

/// Verify the email link by consuming the hashed token.
#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 303, description = "Form verification; redirect to /login"),
        (status = 400, description = "Invalid/expired token", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Payload<VerifyEmailRequest>>,
) -> Result<Response, AuthError> {
    let Some(payload) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };
    let from_form = payload.is_form();
    let request = payload.into_inner();
    let token = request.token.trim();
    if token.is_empty() {
        return Err(AuthError::BadRequest("Missing token"));
    }

    // Hash the token before lookup; raw tokens are never stored server-side.
    let Some(user_id) = state
        .store()
        .consume_token(TokenKind::EmailVerification, &hash_token(token))
        .await?
    else {
        return Err(AuthError::BadRequest("Invalid token"));
    };

    if !state.store().mark_email_verified(user_id).await? {
        return Err(AuthError::BadRequest("Invalid token"));
    }
    state.resolver().refresh_user(user_id).await;
    info!(user_id = %user_id, "email verified");
    if from_form {
        return Ok(see_other("/login"));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
