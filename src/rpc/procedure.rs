//! Procedure registry, tier enforcement and dispatch.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{collections::BTreeMap, future::Future, marker::PhantomData, sync::Arc};
use tracing::{Instrument, debug, error, info_span};

use super::{
    context::RpcContext,
    error::RpcError,
    validation::{Validate, parse_input},
};
use crate::session::ResolvedSession;

/// Who may call a procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Public,
    /// Requires a resolved session.
    Protected,
    /// Requires a resolved session whose user has the admin role.
    Admin,
}

impl Tier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Admin => "admin",
        }
    }
}

/// Check the caller against a tier before any handler code runs.
///
/// # Errors
/// `Unauthorized` without a session, `Forbidden` for non-admins on admin
/// procedures.
pub fn authorize(tier: Tier, session: Option<&ResolvedSession>) -> Result<(), RpcError> {
    match (tier, session) {
        (Tier::Public, _) => Ok(()),
        (Tier::Protected | Tier::Admin, None) => Err(RpcError::Unauthorized),
        (Tier::Protected, Some(_)) => Ok(()),
        (Tier::Admin, Some(session)) if session.is_admin() => Ok(()),
        (Tier::Admin, Some(_)) => Err(RpcError::Forbidden),
    }
}

#[async_trait]
pub trait Procedure: Send + Sync {
    fn tier(&self) -> Tier;

    async fn call(&self, ctx: &RpcContext, input: Value) -> Result<Value, RpcError>;
}

/// Adapts a typed async fn into a [`Procedure`].
pub struct Handler<I, O, F> {
    tier: Tier,
    handler: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, F> Handler<I, O, F> {
    pub const fn new(tier: Tier, handler: F) -> Self {
        Self {
            tier,
            handler,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O, F, Fut> Procedure for Handler<I, O, F>
where
    I: DeserializeOwned + Validate + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(RpcContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
{
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn call(&self, ctx: &RpcContext, input: Value) -> Result<Value, RpcError> {
        let input: I = parse_input(input)?;
        let output = (self.handler)(ctx.clone(), input).await?;
        serde_json::to_value(output).map_err(|err| RpcError::Internal(err.into()))
    }
}

/// Path to procedure map, e.g. `user.list`.
#[derive(Clone, Default)]
pub struct ProcedureRouter {
    procedures: BTreeMap<String, Arc<dyn Procedure>>,
}

impl ProcedureRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler under `path`.
    #[must_use]
    pub fn procedure<I, O, F, Fut>(self, path: &str, tier: Tier, handler: F) -> Self
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(RpcContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        self.register(path, Arc::new(Handler::new(tier, handler)))
    }

    #[must_use]
    pub fn register(mut self, path: &str, procedure: Arc<dyn Procedure>) -> Self {
        self.procedures.insert(path.to_string(), procedure);
        self
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Arc<dyn Procedure>> {
        self.procedures.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    /// Run one call under timing: lookup, authorize, then execute.
    ///
    /// Rejected calls are timed as well, so every call logs exactly one
    /// timing line.
    ///
    /// # Errors
    /// `NotFound` for unknown paths, tier errors, and whatever the handler
    /// returns.
    pub async fn dispatch(&self, ctx: &RpcContext, input: Value) -> Result<Value, RpcError> {
        let path = ctx.meta.path();
        let span = info_span!("rpc.call", rpc.path = path);
        ctx.timed(async {
            let Some(procedure) = self.get(path) else {
                debug!("unknown procedure");
                return Err(RpcError::NotFound(format!("procedure {path}")));
            };
            authorize(procedure.tier(), ctx.session.as_ref())?;
            let result = procedure.call(ctx, input).await;
            if let Err(RpcError::Internal(err)) = &result {
                error!("procedure failed: {err:#}");
            }
            result
        })
        .instrument(span)
        .await
    }
}
