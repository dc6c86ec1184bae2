use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use secrecy::SecretString;
use tracing::{Instrument, debug, error, info_span};
use uuid::Uuid;

use super::{
    Resolution, ResolvedSession, Session, SessionProvider, StoreUnavailable,
    cache::SessionCache,
    cookie::{extract_session_token, has_session_cookie},
    token::{generate_token, hash_token, sign_token, verify_signed},
};
use crate::{
    storage::{SessionStore, SharedStore, UserStore, now_unix_seconds},
    users::User,
};

/// A freshly created session and the signed value to hand to the client.
#[derive(Debug)]
pub struct IssuedSession {
    pub cookie_value: String,
    pub session: Session,
}

/// Authoritative session lookup: signature check, TTL cache, then store.
pub struct SessionResolver {
    store: SharedStore,
    secret: SecretString,
    session_ttl_seconds: i64,
    cache: SessionCache,
}

impl SessionResolver {
    #[must_use]
    pub fn new(
        store: SharedStore,
        secret: SecretString,
        session_ttl_seconds: i64,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            secret,
            session_ttl_seconds,
            cache: SessionCache::new(cache_ttl_seconds),
        }
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Create a session for the user and return the signed cookie value.
    ///
    /// # Errors
    /// Returns an error if token generation or the store insert fails.
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedSession> {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        let record = self
            .store
            .insert_session(&token_hash, user_id, self.session_ttl_seconds)
            .await
            .context("failed to insert session")?;
        Ok(IssuedSession {
            cookie_value: sign_token(&self.secret, &token),
            session: Session {
                token_hash,
                user_id: record.user_id,
                issued_at: record.issued_at_unix,
                expires_at: record.expires_at_unix,
                cached_until: 0,
            },
        })
    }

    /// Token hash behind a signed credential, if the signature is valid.
    #[must_use]
    pub fn token_hash_from(&self, signed: &str) -> Option<Vec<u8>> {
        verify_signed(&self.secret, signed).map(|token| hash_token(&token))
    }

    /// Resolve the request's credential with the full store error.
    ///
    /// # Errors
    /// Returns an error if the session or user lookup fails.
    pub async fn lookup(&self, headers: &HeaderMap) -> Result<Option<ResolvedSession>> {
        let Some(signed) = extract_session_token(headers) else {
            return Ok(None);
        };
        let Some(token_hash) = self.token_hash_from(&signed) else {
            debug!("session credential failed signature check");
            return Ok(None);
        };
        self.resolve_hash(token_hash).await
    }

    async fn resolve_hash(&self, token_hash: Vec<u8>) -> Result<Option<ResolvedSession>> {
        let now = now_unix_seconds();
        if let Some(hit) = self.cache.get(&token_hash, now).await {
            return Ok(Some(hit));
        }

        let Some(record) = self.store.lookup_session(&token_hash).await? else {
            return Ok(None);
        };
        if record.expires_at_unix <= now {
            return Ok(None);
        }
        let Some(user) = self.store.find_user(record.user_id).await? else {
            return Ok(None);
        };
        if user.banned {
            debug!(user_id = %user.id, "session belongs to a banned user");
            return Ok(None);
        }

        let resolved = ResolvedSession {
            session: Session {
                token_hash,
                user_id: record.user_id,
                issued_at: record.issued_at_unix,
                expires_at: record.expires_at_unix,
                cached_until: 0,
            },
            user: User::from(user),
        };
        Ok(Some(self.cache.insert(resolved, now).await))
    }

    /// Sign-out: drop one session from the store and the cache.
    ///
    /// # Errors
    /// Returns an error if the store delete fails.
    pub async fn revoke(&self, token_hash: &[u8]) -> Result<()> {
        self.cache.invalidate(token_hash).await;
        self.store.delete_session(token_hash).await
    }

    /// Drop every session a user holds (password reset, ban, deletion).
    ///
    /// # Errors
    /// Returns an error if the store delete fails.
    pub async fn revoke_user(&self, user_id: Uuid) -> Result<u64> {
        self.cache.invalidate_user(user_id).await;
        self.store.delete_user_sessions(user_id).await
    }

    /// Forget cached snapshots for a user whose profile or role changed.
    pub async fn refresh_user(&self, user_id: Uuid) {
        self.cache.invalidate_user(user_id).await;
    }
}

#[async_trait]
impl SessionProvider for SessionResolver {
    fn peek_cookie(&self, headers: &HeaderMap) -> bool {
        has_session_cookie(headers)
    }

    async fn try_resolve(&self, headers: &HeaderMap) -> Resolution {
        let span = info_span!("session.resolve");
        self.lookup(headers).instrument(span).await.map_err(|err| {
            error!("session resolution failed: {err:#}");
            StoreUnavailable
        })
    }
}
