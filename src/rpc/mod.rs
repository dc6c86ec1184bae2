//! JSON RPC endpoint binding resolved sessions to typed procedures.
//!
//! Flow Overview:
//! 1) `POST /api/rpc` receives one call or a batch of calls.
//! 2) The session is resolved once per request (memoized). A store failure
//!    answers INTERNAL_SERVER_ERROR for the whole request.
//! 3) Each call gets its own [`RpcContext`], is authorized against the
//!    procedure tier, then executed and serialized.
//!
//! A single call answers with its error's HTTP status; a batch answers 200 and
//! carries per-call errors in the body.

pub mod context;
pub mod error;
pub mod procedure;
pub mod validation;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{
    api::state::AppState,
    session::{CheckedSession, ResolvedSession},
};

pub use context::{CallMeta, RpcContext};
pub use error::{ErrorBody, ErrorCode, FieldErrors, RpcError};
pub use procedure::{Procedure, ProcedureRouter, Tier, authorize};

/// Upper bound on calls per batch request.
pub const MAX_BATCH_SIZE: usize = 32;

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct RpcCall {
    /// Echoed back unchanged.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub id: Value,
    /// Procedure path, e.g. `user.list`.
    pub path: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub input: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RpcRequest {
    Batch(Vec<RpcCall>),
    Single(RpcCall),
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RpcResponse {
    #[schema(value_type = Object)]
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl RpcResponse {
    fn from_outcome(id: Value, outcome: Result<Value, RpcError>) -> (StatusCode, Self) {
        match outcome {
            Ok(result) => (
                StatusCode::OK,
                Self {
                    id,
                    result: Some(result),
                    error: None,
                },
            ),
            Err(err) => (
                err.code().status(),
                Self {
                    id,
                    result: None,
                    error: Some(err.to_body()),
                },
            ),
        }
    }

    fn request_error(err: &RpcError) -> Response {
        let body = Self {
            id: Value::Null,
            result: None,
            error: Some(err.to_body()),
        };
        (err.code().status(), Json(body)).into_response()
    }
}

/// Execute one call with a fresh context.
pub async fn execute(
    state: &Arc<AppState>,
    session: Option<ResolvedSession>,
    call: RpcCall,
) -> (StatusCode, RpcResponse) {
    let ctx = RpcContext::new(state.clone(), session, &call.path);
    let outcome = state.procedures().dispatch(&ctx, call.input).await;
    RpcResponse::from_outcome(call.id, outcome)
}

#[utoipa::path(
    post,
    path = "/api/rpc",
    request_body = RpcCall,
    responses(
        (status = 200, description = "Call result, or per-call results for a batch", body = RpcResponse),
        (status = 400, description = "Malformed request or invalid input", body = RpcResponse),
        (status = 401, description = "Procedure requires a session", body = RpcResponse),
        (status = 403, description = "Procedure requires the admin role", body = RpcResponse),
        (status = 404, description = "Unknown procedure or resource", body = RpcResponse),
        (status = 500, description = "Session store or procedure failure", body = RpcResponse),
    ),
    tag = "rpc"
)]
pub async fn rpc_handler(
    Extension(state): Extension<Arc<AppState>>,
    CheckedSession(resolution): CheckedSession,
    payload: Result<Json<RpcRequest>, JsonRejection>,
) -> Response {
    let session = match resolution {
        Ok(session) => session,
        Err(err) => {
            error!("rpc request aborted: {err}");
            return RpcResponse::request_error(&RpcError::Internal(err.into()));
        }
    };
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("rejected rpc payload: {rejection}");
            return RpcResponse::request_error(&RpcError::BadRequest(
                "request body must be an rpc call or a batch of calls".to_string(),
            ));
        }
    };

    match request {
        RpcRequest::Single(call) => {
            let (status, response) = execute(&state, session, call).await;
            (status, Json(response)).into_response()
        }
        RpcRequest::Batch(calls) => {
            if calls.is_empty() {
                return RpcResponse::request_error(&RpcError::BadRequest(
                    "batch must contain at least one call".to_string(),
                ));
            }
            if calls.len() > MAX_BATCH_SIZE {
                return RpcResponse::request_error(&RpcError::BadRequest(format!(
                    "batch must contain at most {MAX_BATCH_SIZE} calls"
                )));
            }
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                let (_, response) = execute(&state, session.clone(), call).await;
                responses.push(response);
            }
            (StatusCode::OK, Json(responses)).into_response()
        }
    }
}
