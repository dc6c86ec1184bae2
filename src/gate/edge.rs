//! Optimistic edge check in front of every route.
//!
//! Flow Overview:
//! 1) Classify the path.
//! 2) Look only at session cookie presence; never touch the store.
//! 3) Allow, or answer `303 See Other` toward sign-in or the callback.
//!
//! The decision is advisory. Pages and procedures re-validate the session, so
//! a panic while deciding is logged and the request is let through.

use axum::{
    extract::{Extension, Request},
    http::{HeaderValue, StatusCode, header::LOCATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tracing::{debug, error};

use super::{
    callback::{callback_from_query, sanitize, sign_in_redirect},
    routes::{RouteTier, classify},
};
use crate::{
    api::state::AppState,
    session::{SessionMemo, SessionProvider},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeDecision {
    Allow,
    Redirect(String),
}

/// Pure gate decision from path, raw query and cookie presence.
#[must_use]
pub fn decide(path: &str, query: Option<&str>, has_session_cookie: bool) -> EdgeDecision {
    match classify(path) {
        RouteTier::Unrestricted => EdgeDecision::Allow,
        RouteTier::GuestOnly if has_session_cookie => {
            let target = sanitize(callback_from_query(query).as_deref());
            let target_path = target.split(['?', '#']).next().unwrap_or("/");
            if classify(target_path) == RouteTier::GuestOnly {
                EdgeDecision::Redirect("/".to_string())
            } else {
                EdgeDecision::Redirect(target)
            }
        }
        RouteTier::GuestOnly => EdgeDecision::Allow,
        RouteTier::Protected | RouteTier::Admin if !has_session_cookie => {
            EdgeDecision::Redirect(sign_in_redirect(path, query))
        }
        RouteTier::Protected | RouteTier::Admin => EdgeDecision::Allow,
    }
}

/// Run a decision, failing open if it panics.
pub fn guarded<F>(decision: F) -> EdgeDecision
where
    F: FnOnce() -> EdgeDecision,
{
    match catch_unwind(AssertUnwindSafe(decision)) {
        Ok(decision) => decision,
        Err(_) => {
            error!("edge gate decision panicked; allowing request");
            EdgeDecision::Allow
        }
    }
}

/// `303 See Other` to a same-origin target.
#[must_use]
pub fn see_other(target: &str) -> Response {
    let location = HeaderValue::from_str(target).unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
}

pub async fn edge_gate(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = {
        let uri = request.uri();
        let headers = request.headers();
        guarded(|| {
            decide(
                uri.path(),
                uri.query(),
                state.resolver().peek_cookie(headers),
            )
        })
    };

    match decision {
        EdgeDecision::Allow => {
            request.extensions_mut().insert(SessionMemo::new());
            next.run(request).await
        }
        EdgeDecision::Redirect(target) => {
            debug!(path = request.uri().path(), location = %target, "edge gate redirect");
            see_other(&target)
        }
    }
}
