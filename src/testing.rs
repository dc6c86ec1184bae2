//! Fixtures shared by unit tests.

use anyhow::{Result, bail};
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use secrecy::SecretString;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::state::{AppState, AuthConfig},
    session::{ResolvedSession, SessionProvider, cookie::SESSION_COOKIE_NAME},
    storage::{CreateUserOutcome, MemoryStore, NewUser, UserRecord, UserStore},
};

pub const SECRET: &str = "0123456789abcdef0123456789abcdef";

pub fn config() -> AuthConfig {
    AuthConfig::new(
        "http://localhost:8080".to_string(),
        SecretString::from(SECRET),
    )
}

pub fn memory_state() -> (Arc<MemoryStore>, Arc<AppState>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config(), store.clone()));
    (store, state)
}

pub async fn create_user(
    store: &MemoryStore,
    name: &str,
    email: &str,
    role: Option<&str>,
) -> Result<UserRecord> {
    let outcome = store
        .create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "unused".to_string(),
        })
        .await?;
    let CreateUserOutcome::Created(user) = outcome else {
        bail!("user {email} already exists");
    };
    store.mark_email_verified(user.id).await?;
    if let Some(role) = role {
        store.set_role(user.id, Some(role.to_string())).await?;
    }
    match store.find_user(user.id).await? {
        Some(user) => Ok(user),
        None => bail!("user {email} vanished"),
    }
}

pub fn cookie_headers(cookie_value: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={cookie_value}"))?,
    );
    Ok(headers)
}

/// Issue a session for the user and resolve it like a request would.
pub async fn session_for(state: &AppState, user_id: Uuid) -> Result<ResolvedSession> {
    let issued = state.resolver().issue(user_id).await?;
    let headers = cookie_headers(&issued.cookie_value)?;
    match state.resolver().resolve(&headers).await {
        Some(resolved) => Ok(resolved),
        None => bail!("issued session did not resolve"),
    }
}
