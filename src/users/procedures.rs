//! `user.*` procedures.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{Page, PublicProfile, User};
use crate::{
    rpc::{
        RpcContext, RpcError,
        validation::{
            DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT, MAX_NAME_LEN, MAX_QUERY_LEN, Validate,
            Validator,
        },
    },
    storage::{ProfileUpdate, UserStore},
};

/// Input for procedures that take no arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoInput {}

impl Validate for NoInput {
    fn validate(&mut self, _v: &mut Validator) {}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Validate for UpdateProfileInput {
    fn validate(&mut self, v: &mut Validator) {
        if self.name.is_none() && self.image.is_none() {
            v.error("name", "provide a name or an image");
        }
        if let Some(name) = self.name.as_mut() {
            v.trimmed_len("name", name, 1, MAX_NAME_LEN);
        }
        if let Some(image) = self.image.as_deref() {
            v.http_url("image", image.trim());
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserIdInput {
    pub id: String,
    #[serde(skip)]
    parsed: Option<Uuid>,
}

impl UserIdInput {
    fn user_id(&self) -> Result<Uuid, RpcError> {
        self.parsed.ok_or_else(|| RpcError::field("id", "must be a UUID"))
    }
}

impl Validate for UserIdInput {
    fn validate(&mut self, v: &mut Validator) {
        self.parsed = v.uuid("id", &self.id);
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListInput {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl ListInput {
    pub(super) fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Validate for ListInput {
    fn validate(&mut self, v: &mut Validator) {
        v.range("page", self.page, 1, i64::MAX);
        v.range("limit", self.limit, 1, MAX_LIMIT);
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchInput {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Validate for SearchInput {
    fn validate(&mut self, v: &mut Validator) {
        v.trimmed_len("query", &mut self.query, 1, MAX_QUERY_LEN);
        v.range("limit", self.limit, 1, MAX_LIMIT);
    }
}

const fn default_page() -> i64 {
    DEFAULT_PAGE
}

const fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

pub(super) async fn me(ctx: RpcContext, _input: NoInput) -> Result<User, RpcError> {
    let caller = ctx.require_session()?.user_id();
    // Re-read so the caller sees edits made since the session was cached.
    let user = ctx
        .state
        .store()
        .find_user(caller)
        .await?
        .ok_or_else(|| RpcError::NotFound("user".to_string()))?;
    Ok(User::from(user))
}

pub(super) async fn update(ctx: RpcContext, input: UpdateProfileInput) -> Result<User, RpcError> {
    let caller = ctx.require_session()?.user_id();
    let update = ProfileUpdate {
        name: input.name,
        image: input.image.map(|image| image.trim().to_string()),
    };
    let user = ctx
        .state
        .store()
        .update_profile(caller, update)
        .await?
        .ok_or_else(|| RpcError::NotFound("user".to_string()))?;
    ctx.state.resolver().refresh_user(caller).await;
    Ok(User::from(user))
}

pub(super) async fn delete(ctx: RpcContext, _input: NoInput) -> Result<Deleted, RpcError> {
    let caller = ctx.require_session()?.user_id();
    ctx.state
        .resolver()
        .revoke_user(caller)
        .await
        .context("failed to revoke sessions before deleting account")?;
    let deleted = ctx.state.store().delete_user(caller).await?;
    info!(user_id = %caller, "account deleted");
    Ok(Deleted { deleted })
}

pub(super) async fn get_by_id(ctx: RpcContext, input: UserIdInput) -> Result<PublicProfile, RpcError> {
    let id = input.user_id()?;
    ctx.state
        .store()
        .find_user(id)
        .await?
        .map(PublicProfile::from)
        .ok_or_else(|| RpcError::NotFound("user".to_string()))
}

pub(super) async fn list(ctx: RpcContext, input: ListInput) -> Result<Page<PublicProfile>, RpcError> {
    let page = ctx
        .state
        .store()
        .list_users(input.offset(), input.limit)
        .await?;
    Ok(Page {
        items: page.users.into_iter().map(PublicProfile::from).collect(),
        page: input.page,
        limit: input.limit,
        total: page.total,
    })
}

pub(super) async fn search(ctx: RpcContext, input: SearchInput) -> Result<Vec<PublicProfile>, RpcError> {
    ctx.require_session()?;
    let users = ctx
        .state
        .store()
        .search_users(&input.query, input.limit)
        .await?;
    Ok(users
        .into_iter()
        .take(usize::try_from(input.limit).unwrap_or(usize::MAX))
        .map(PublicProfile::from)
        .collect())
}
