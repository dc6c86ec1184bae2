//! Session model and the authoritative resolver.
//!
//! Flow Overview:
//! - The edge gate only asks [`SessionProvider::peek_cookie`]: is a session
//!   cookie present? No I/O, no validity check.
//! - Pages ask [`SessionProvider::resolve`], which verifies the cookie
//!   signature, consults the TTL cache, then the store. Any store error
//!   resolves to "no session" (fail closed).
//! - The RPC endpoint asks [`SessionProvider::try_resolve`] instead, so a store
//!   outage answers 500 rather than masquerading as UNAUTHORIZED.
//!
//! A [`SessionMemo`] lives in each request's extensions so one request
//! resolves at most once, however many extractors ask.

pub mod cache;
pub mod cookie;
mod resolver;
pub mod token;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{api::state::AppState, users::User};

pub use resolver::{IssuedSession, SessionResolver};

/// Snapshot of a persisted session.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip)]
    #[schema(ignore)]
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
    /// Unix seconds until which this snapshot may be served from cache.
    pub cached_until: i64,
}

/// A validated session together with its user.
#[derive(Clone, Debug)]
pub struct ResolvedSession {
    pub session: Session,
    pub user: User,
}

impl ResolvedSession {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// The session or user store failed while resolving a credential.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("session store unavailable")]
pub struct StoreUnavailable;

/// Outcome of an authoritative lookup that keeps store failures visible.
pub type Resolution = Result<Option<ResolvedSession>, StoreUnavailable>;

/// Two-speed view of the session: a cheap presence check and the
/// authoritative lookup.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Whether a session cookie is present. Never performs I/O.
    fn peek_cookie(&self, headers: &HeaderMap) -> bool;

    /// Authoritative resolution; `Ok(None)` for missing, invalid, expired or
    /// revoked sessions, `Err` only when the store failed.
    async fn try_resolve(&self, headers: &HeaderMap) -> Resolution;

    /// Fail-closed resolution: store failures read as "no session".
    async fn resolve(&self, headers: &HeaderMap) -> Option<ResolvedSession> {
        self.try_resolve(headers).await.ok().flatten()
    }
}

/// Per-request memo of the authoritative resolution.
#[derive(Clone, Debug, Default)]
pub struct SessionMemo(Arc<OnceCell<Resolution>>);

impl SessionMemo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve once; later calls reuse the first answer, failures included.
    pub async fn get_or_try_resolve<P>(&self, provider: &P, headers: &HeaderMap) -> Resolution
    where
        P: SessionProvider + ?Sized,
    {
        self.0
            .get_or_init(|| provider.try_resolve(headers))
            .await
            .clone()
    }

    /// Fail-closed view of [`Self::get_or_try_resolve`].
    pub async fn get_or_resolve<P>(&self, provider: &P, headers: &HeaderMap) -> Option<ResolvedSession>
    where
        P: SessionProvider + ?Sized,
    {
        self.get_or_try_resolve(provider, headers)
            .await
            .ok()
            .flatten()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.initialized()
    }
}

/// Resolve through the request's [`SessionMemo`], installing one when the
/// edge gate did not, so several extractors share a single lookup.
async fn memoized_resolution(parts: &mut Parts) -> Resolution {
    let Some(state) = parts.extensions.get::<Arc<AppState>>().cloned() else {
        error!("AppState extension missing; cannot resolve session");
        return Err(StoreUnavailable);
    };
    let memo = match parts.extensions.get::<SessionMemo>() {
        Some(memo) => memo.clone(),
        None => {
            let memo = SessionMemo::new();
            parts.extensions.insert(memo.clone());
            memo
        }
    };
    memo.get_or_try_resolve(state.resolver().as_ref(), &parts.headers)
        .await
}

/// Extractor for pages and auth handlers: fail closed, so any failure reads
/// as anonymous.
#[derive(Clone, Debug)]
pub struct CurrentSession(pub Option<ResolvedSession>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(memoized_resolution(parts).await.ok().flatten()))
    }
}

/// Extractor that keeps store failures distinct from "no session".
#[derive(Clone, Debug)]
pub struct CheckedSession(pub Resolution);

#[async_trait]
impl<S> FromRequestParts<S> for CheckedSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(memoized_resolution(parts).await))
    }
}
