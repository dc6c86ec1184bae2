//! Shared application state and auth configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::email::{EmailSender, LogEmailSender};
use crate::{rpc::ProcedureRouter, session::SessionResolver, storage::SharedStore, users};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_SESSION_CACHE_SECONDS: i64 = 5 * 60;
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    secret: SecretString,
    session_ttl_seconds: i64,
    session_cache_seconds: i64,
    token_ttl_seconds: i64,
    require_email_verification: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String, secret: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cache_seconds: DEFAULT_SESSION_CACHE_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            require_email_verification: true,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cache_seconds(mut self, seconds: i64) -> Self {
        self.session_cache_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_require_email_verification(mut self, required: bool) -> Self {
        self.require_email_verification = required;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cache_seconds(&self) -> i64 {
        self.session_cache_seconds
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn require_email_verification(&self) -> bool {
        self.require_email_verification
    }

    /// Only mark cookies secure when the app is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Everything handlers reach through `Extension<Arc<AppState>>`.
pub struct AppState {
    config: AuthConfig,
    store: SharedStore,
    resolver: Arc<SessionResolver>,
    procedures: ProcedureRouter,
    email: Arc<dyn EmailSender>,
}

impl AppState {
    /// State with the default procedures and the logging email sender.
    #[must_use]
    pub fn new(config: AuthConfig, store: SharedStore) -> Self {
        let resolver = Arc::new(SessionResolver::new(
            store.clone(),
            config.secret().clone(),
            config.session_ttl_seconds(),
            config.session_cache_seconds(),
        ));
        Self {
            config,
            store,
            resolver,
            procedures: users::procedures(),
            email: Arc::new(LogEmailSender),
        }
    }

    #[must_use]
    pub fn with_email_sender(mut self, email: Arc<dyn EmailSender>) -> Self {
        self.email = email;
        self
    }

    #[must_use]
    pub fn with_procedures(mut self, procedures: ProcedureRouter) -> Self {
        self.procedures = procedures;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<SessionResolver> {
        &self.resolver
    }

    #[must_use]
    pub fn procedures(&self) -> &ProcedureRouter {
        &self.procedures
    }

    #[must_use]
    pub fn email(&self) -> &Arc<dyn EmailSender> {
        &self.email
    }
}
