//! Auth endpoints under `/api/auth`.
//!
//! Flow Overview:
//! - `sign-up` stores an argon2 hash and mails a verification link.
//! - `verify-email` consumes the single-use token and marks the address verified.
//! - `sign-in` checks the password, ban and verification state, then issues a
//!   signed session cookie.
//! - `session` and `sign-out` read or revoke the current session.
//! - `forgot-password` and `reset-password` run the reset-link flow; a reset
//!   revokes every session the user holds.
//!
//! Raw tokens only ever leave the server (cookie, email link); stores keep
//! SHA-256 hashes.
//!
//! Bodies arrive as JSON or as urlencoded page forms (see [`payload`]); a form
//! sign-in lands on the sanitized `callbackUrl`.

pub(crate) mod password;
pub(crate) mod payload;
pub(crate) mod session;
pub(crate) mod sign_up;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Errors surfaced by auth handlers. Internal details are logged, never
/// returned.
#[derive(Debug)]
pub(crate) enum AuthError {
    BadRequest(&'static str),
    InvalidCredentials,
    Forbidden(&'static str),
    Conflict,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response()
            }
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message).into_response(),
            Self::Conflict => (StatusCode::CONFLICT, "Email already registered").into_response(),
            Self::Internal(err) => {
                error!("Failed to handle auth request: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
