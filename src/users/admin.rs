//! `admin.*` procedures. The dispatcher has already checked the admin role.

use regex::Regex;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{ADMIN_ROLE, Page, User, procedures::ListInput};
use crate::{
    rpc::{
        RpcContext, RpcError,
        validation::{Validate, Validator},
    },
    storage::{UserRecord, UserStore},
};

/// Roles are short lowercase identifiers such as `admin`.
fn valid_role(role: &str) -> bool {
    Regex::new(r"^[a-z][a-z0-9_-]{0,31}$").is_ok_and(|re| re.is_match(role))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SetRoleInput {
    pub user_id: String,
    /// `null` clears the role.
    pub role: Option<String>,
    #[serde(skip)]
    parsed: Option<Uuid>,
}

impl Validate for SetRoleInput {
    fn validate(&mut self, v: &mut Validator) {
        self.parsed = v.uuid("userId", &self.user_id);
        if let Some(role) = self.role.as_mut() {
            *role = role.trim().to_string();
            if !valid_role(role) {
                v.error("role", "must be lowercase letters, digits, '-' or '_' (max 32)");
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SetBannedInput {
    pub user_id: String,
    pub banned: bool,
    #[serde(skip)]
    parsed: Option<Uuid>,
}

impl Validate for SetBannedInput {
    fn validate(&mut self, v: &mut Validator) {
        self.parsed = v.uuid("userId", &self.user_id);
    }
}

fn target(parsed: Option<Uuid>) -> Result<Uuid, RpcError> {
    parsed.ok_or_else(|| RpcError::field("userId", "must be a UUID"))
}

fn found(user: Option<UserRecord>) -> Result<User, RpcError> {
    user.map(User::from)
        .ok_or_else(|| RpcError::NotFound("user".to_string()))
}

pub(super) async fn list_users(ctx: RpcContext, input: ListInput) -> Result<Page<User>, RpcError> {
    let page = ctx
        .state
        .store()
        .list_users(input.offset(), input.limit)
        .await?;
    Ok(Page {
        items: page.users.into_iter().map(User::from).collect(),
        page: input.page,
        limit: input.limit,
        total: page.total,
    })
}

pub(super) async fn set_role(ctx: RpcContext, input: SetRoleInput) -> Result<User, RpcError> {
    let caller = ctx.require_session()?.user_id();
    let user_id = target(input.parsed)?;
    if user_id == caller && input.role.as_deref() != Some(ADMIN_ROLE) {
        return Err(RpcError::field("userId", "admins cannot remove their own admin role"));
    }
    let user = found(ctx.state.store().set_role(user_id, input.role).await?)?;
    ctx.state.resolver().refresh_user(user_id).await;
    info!(admin_id = %caller, user_id = %user_id, role = ?user.role, "role updated");
    Ok(user)
}

pub(super) async fn set_banned(ctx: RpcContext, input: SetBannedInput) -> Result<User, RpcError> {
    let caller = ctx.require_session()?.user_id();
    let user_id = target(input.parsed)?;
    if user_id == caller {
        return Err(RpcError::field("userId", "admins cannot ban themselves"));
    }
    let user = found(ctx.state.store().set_banned(user_id, input.banned).await?)?;
    if input.banned {
        let revoked = ctx.state.resolver().revoke_user(user_id).await?;
        info!(admin_id = %caller, user_id = %user_id, revoked, "user banned");
    } else {
        ctx.state.resolver().refresh_user(user_id).await;
        info!(admin_id = %caller, user_id = %user_id, "user unbanned");
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::SessionProvider,
        testing::{cookie_headers, create_user, memory_state, session_for},
    };
    use anyhow::Result;
    use serde_json::{Value, json};

    async fn call(ctx: &RpcContext, input: Value) -> Result<Value, RpcError> {
        ctx.state.procedures().dispatch(ctx, input).await
    }

    #[test]
    fn role_pattern() {
        assert!(valid_role("admin"));
        assert!(valid_role("support-2"));
        assert!(!valid_role(""));
        assert!(!valid_role("Admin"));
        assert!(!valid_role(&"a".repeat(33)));
    }

    #[tokio::test]
    async fn admin_procedures_need_the_admin_role() -> Result<()> {
        let (store, state) = memory_state();
        let bob = create_user(&store, "Bob", "bob@example.com", None).await?;
        let session = session_for(&state, bob.id).await?;

        let ctx = RpcContext::new(state.clone(), None, "admin.listUsers");
        assert!(matches!(call(&ctx, Value::Null).await, Err(RpcError::Unauthorized)));

        let ctx = RpcContext::new(state.clone(), Some(session), "admin.setRole");
        let result = call(&ctx, json!({ "userId": bob.id, "role": "admin" })).await;
        assert!(matches!(result, Err(RpcError::Forbidden)));
        assert_eq!(store.find_user(bob.id).await?.and_then(|u| u.role), None);
        Ok(())
    }

    #[tokio::test]
    async fn list_users_returns_full_profiles() -> Result<()> {
        let (store, state) = memory_state();
        let ada = create_user(&store, "Ada", "ada@example.com", Some(ADMIN_ROLE)).await?;
        create_user(&store, "Bob", "bob@example.com", None).await?;
        let session = session_for(&state, ada.id).await?;

        let ctx = RpcContext::new(state.clone(), Some(session), "admin.listUsers");
        let page = call(&ctx, json!({ "limit": 50 })).await?;
        assert_eq!(page["total"], 2);
        assert!(page["items"][0].get("email").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn banning_revokes_sessions() -> Result<()> {
        let (store, state) = memory_state();
        let ada = create_user(&store, "Ada", "ada@example.com", Some(ADMIN_ROLE)).await?;
        let bob = create_user(&store, "Bob", "bob@example.com", None).await?;
        let admin = session_for(&state, ada.id).await?;
        let issued = state.resolver().issue(bob.id).await?;
        let bob_headers = cookie_headers(&issued.cookie_value)?;
        assert!(state.resolver().resolve(&bob_headers).await.is_some());

        let ctx = RpcContext::new(state.clone(), Some(admin), "admin.setBanned");
        let user = call(&ctx, json!({ "userId": bob.id, "banned": true })).await?;
        assert_eq!(user["banned"], true);
        assert!(state.resolver().resolve(&bob_headers).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn admins_cannot_ban_or_demote_themselves() -> Result<()> {
        let (store, state) = memory_state();
        let ada = create_user(&store, "Ada", "ada@example.com", Some(ADMIN_ROLE)).await?;
        let admin = session_for(&state, ada.id).await?;

        let ctx = RpcContext::new(state.clone(), Some(admin.clone()), "admin.setBanned");
        let result = call(&ctx, json!({ "userId": ada.id, "banned": true })).await;
        assert!(matches!(result, Err(RpcError::Validation(_))));

        let ctx = RpcContext::new(state.clone(), Some(admin), "admin.setRole");
        let result = call(&ctx, json!({ "userId": ada.id, "role": null })).await;
        assert!(matches!(result, Err(RpcError::Validation(_))));

        let stored = store.find_user(ada.id).await?;
        assert_eq!(stored.as_ref().map(|u| u.banned), Some(false));
        assert_eq!(stored.and_then(|u| u.role).as_deref(), Some(ADMIN_ROLE));
        Ok(())
    }

    #[tokio::test]
    async fn set_role_refreshes_cached_sessions() -> Result<()> {
        let (store, state) = memory_state();
        let ada = create_user(&store, "Ada", "ada@example.com", Some(ADMIN_ROLE)).await?;
        let bob = create_user(&store, "Bob", "bob@example.com", None).await?;
        let admin = session_for(&state, ada.id).await?;
        let issued = state.resolver().issue(bob.id).await?;
        let bob_headers = cookie_headers(&issued.cookie_value)?;
        let cached = state.resolver().resolve(&bob_headers).await;
        assert_eq!(cached.map(|s| s.is_admin()), Some(false));

        let ctx = RpcContext::new(state.clone(), Some(admin), "admin.setRole");
        call(&ctx, json!({ "userId": bob.id, "role": "admin" })).await?;

        let refreshed = state.resolver().resolve(&bob_headers).await;
        assert_eq!(refreshed.map(|s| s.is_admin()), Some(true));
        Ok(())
    }
}
