//! Per-call context handed to procedures.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};
use tracing::info;

use super::error::RpcError;
use crate::{api::state::AppState, session::ResolvedSession};

/// Call metadata shared by every layer wrapping one call.
#[derive(Debug)]
pub struct CallMeta {
    path: String,
    started: Instant,
    instrumented: AtomicBool,
}

impl CallMeta {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            started: Instant::now(),
            instrumented: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Claim the timing slot; only the first caller gets `true`.
    pub fn claim_instrumentation(&self) -> bool {
        self.instrumented
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Milliseconds since the call was received.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        self.instrumented.load(Ordering::Acquire)
    }
}

/// Everything a procedure needs for one call.
#[derive(Clone)]
pub struct RpcContext {
    pub state: Arc<AppState>,
    pub session: Option<ResolvedSession>,
    pub meta: Arc<CallMeta>,
}

impl RpcContext {
    #[must_use]
    pub fn new(state: Arc<AppState>, session: Option<ResolvedSession>, path: &str) -> Self {
        Self {
            state,
            session,
            meta: Arc::new(CallMeta::new(path)),
        }
    }

    /// Session required by protected procedures.
    ///
    /// # Errors
    /// Returns `Unauthorized` when the call has no session.
    pub fn require_session(&self) -> Result<&ResolvedSession, RpcError> {
        self.session.as_ref().ok_or(RpcError::Unauthorized)
    }

    /// Run `fut`, logging its duration once per call no matter how many
    /// layers wrap it in `timed`.
    pub async fn timed<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        if !self.meta.claim_instrumentation() {
            return fut.await;
        }
        let output = fut.await;
        info!(
            rpc.path = self.meta.path(),
            elapsed_ms = self.meta.elapsed_ms(),
            "rpc call timing"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_claim_wins() {
        let meta = CallMeta::new("user.me");
        assert!(!meta.is_instrumented());
        assert!(meta.claim_instrumentation());
        assert!(!meta.claim_instrumentation());
        assert!(meta.is_instrumented());
        assert_eq!(meta.path(), "user.me");
    }
}
