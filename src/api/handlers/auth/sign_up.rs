use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    AuthError,
    payload::Payload,
    types::{SignUpRequest, SignUpResponse},
    utils::{hash_password, normalize_email, valid_email, valid_name, valid_password},
    verification::issue_email_token,
};
use crate::{
    api::{email::EmailMessage, state::AppState},
    gate::see_other,
    storage::{CreateUserOutcome, NewUser, TokenKind, UserStore},
    users::User,
};

#[utoipa::path(
    post,
    path = "/api/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created; verification email sent", body = SignUpResponse),
        (status = 303, description = "Form sign-up; redirect to /login"),
        (status = 400, description = "Invalid name, email or password", body = String),
        (status = 409, description = "Email already registered", body = String),
    ),
    tag = "auth"
)]
pub async fn sign_up(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Payload<SignUpRequest>>,
) -> Result<Response, AuthError> {
    let Some(payload) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };
    let from_form = payload.is_form();
    let request = payload.into_inner();

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::BadRequest("Invalid email"));
    }
    if !valid_name(&request.name) {
        return Err(AuthError::BadRequest("Name must be 1 to 100 characters"));
    }
    if !valid_password(&request.password) {
        return Err(AuthError::BadRequest("Password must be 8 to 128 characters"));
    }

    let password_hash = hash_password(request.password).await?;
    let outcome = state
        .store()
        .create_user(NewUser {
            name: request.name.trim().to_string(),
            email,
            password_hash,
        })
        .await?;
    let user = match outcome {
        CreateUserOutcome::Created(user) => user,
        CreateUserOutcome::Conflict => return Err(AuthError::Conflict),
    };
    info!(user_id = %user.id, "user registered");

    // The account exists at this point; a mail failure must not undo it.
    match issue_email_token(&state, TokenKind::EmailVerification, user.id).await {
        Ok(token) => {
            let message = EmailMessage::verify_email(&user.email, state.config().base_url(), &token);
            if let Err(err) = state.email().send(&message) {
                error!("Failed to send verification email: {err:#}");
            }
        }
        Err(err) => error!("Failed to create verification token: {err:#}"),
    }

    if from_form {
        return Ok(see_other("/login"));
    }
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user: User::from(user),
        }),
    )
        .into_response())
}
