//! Persistence seams for users, sessions and single-use tokens.
//!
//! Flow Overview:
//! - Handlers and the session resolver only talk to the [`Store`] trait object.
//! - [`postgres::PgStore`] is the production backend (`sqlx`, Postgres).
//! - [`memory::MemoryStore`] keeps everything in process; it backs tests and
//!   `memory://` DSNs for local development.
//!
//! Session and verification tokens are persisted as SHA-256 hashes only; raw
//! token values never reach the store.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle to the configured backend.
pub type SharedStore = Arc<dyn Store>;

/// Full user row, including the password hash that never leaves the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub role: Option<String>,
    pub banned: bool,
    pub image: Option<String>,
    pub password_hash: String,
    pub created_at_unix: i64,
}

/// Input for registration; the email is expected to be normalized already.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserRecord),
    Conflict,
}

/// Allow-listed profile changes; `None` keeps the current value.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none()
    }
}

/// One page of users plus the total count for pagination.
#[derive(Clone, Debug)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub total: i64,
}

/// Minimal data stored for a session token hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub issued_at_unix: i64,
    pub expires_at_unix: i64,
}

/// Purpose of a single-use token sent by email.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome>;
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    /// Newest users first.
    async fn list_users(&self, offset: i64, limit: i64) -> Result<UserPage>;
    /// Case-insensitive substring match on the display name.
    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserRecord>>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<UserRecord>>;
    async fn set_role(&self, id: Uuid, role: Option<String>) -> Result<Option<UserRecord>>;
    async fn set_banned(&self, id: Uuid, banned: bool) -> Result<Option<UserRecord>>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool>;
    async fn mark_email_verified(&self, id: Uuid) -> Result<bool>;
    /// Deletes the user together with their sessions and tokens.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<SessionRecord>;
    /// Returns only sessions that have not expired yet.
    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;
    async fn delete_session(&self, token_hash: &[u8]) -> Result<()>;
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()>;
    /// Deletes the token and returns its user when it existed and was still valid.
    async fn consume_token(&self, kind: TokenKind, token_hash: &[u8]) -> Result<Option<Uuid>>;
}

/// Everything the service needs from a backend.
#[async_trait]
pub trait Store: UserStore + SessionStore + TokenStore {
    /// Cheap liveness probe used by `/health`.
    async fn ping(&self) -> Result<()>;

    fn backend(&self) -> &'static str;
}

/// Unix seconds, used for expiry checks across stores and the session cache.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
