//! User views and the RPC procedures that read and mutate them.
//!
//! Two projections leave the server: [`User`] (the caller's own profile, or
//! any profile for admins) and [`PublicProfile`], an allow-list that never
//! carries email, role, ban or verification state.

mod admin;
mod procedures;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    rpc::{ProcedureRouter, Tier},
    storage::UserRecord,
};

pub use admin::{SetBannedInput, SetRoleInput};
pub use procedures::{ListInput, NoInput, SearchInput, UpdateProfileInput, UserIdInput};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub role: Option<String>,
    pub banned: bool,
    pub image: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            email_verified: record.email_verified,
            role: record.role,
            banned: record.banned,
            image: record.image,
            created_at: record.created_at_unix,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub created_at: i64,
}

impl From<UserRecord> for PublicProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            image: record.image,
            created_at: record.created_at_unix,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// Every procedure the service exposes under `/api/rpc`.
#[must_use]
pub fn procedures() -> ProcedureRouter {
    ProcedureRouter::new()
        .procedure("user.me", Tier::Protected, procedures::me)
        .procedure("user.update", Tier::Protected, procedures::update)
        .procedure("user.delete", Tier::Protected, procedures::delete)
        .procedure("user.getById", Tier::Public, procedures::get_by_id)
        .procedure("user.list", Tier::Public, procedures::list)
        .procedure("user.search", Tier::Protected, procedures::search)
        .procedure("admin.listUsers", Tier::Admin, admin::list_users)
        .procedure("admin.setRole", Tier::Admin, admin::set_role)
        .procedure("admin.setBanned", Tier::Admin, admin::set_banned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            email_verified: true,
            role: Some(ADMIN_ROLE.to_string()),
            banned: false,
            image: None,
            password_hash: "$argon2id$secret".to_string(),
            created_at_unix: 1_700_000_000,
        }
    }

    #[test]
    fn public_profile_is_an_allow_list() -> anyhow::Result<()> {
        let json = serde_json::to_value(PublicProfile::from(record()))?;
        let mut keys: Vec<String> = json.as_object().map(|o| o.keys().cloned().collect()).unwrap_or_default();
        keys.sort();
        assert_eq!(keys, ["createdAt", "id", "image", "name"]);
        Ok(())
    }

    #[test]
    fn user_never_serializes_the_password_hash() -> anyhow::Result<()> {
        let user = User::from(record());
        assert!(user.is_admin());
        let json = serde_json::to_string(&user)?;
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"emailVerified\":true"));
        Ok(())
    }

    #[test]
    fn every_procedure_path_is_registered() {
        let router = procedures();
        let paths: Vec<_> = router.paths().collect();
        assert_eq!(
            paths,
            [
                "admin.listUsers",
                "admin.setBanned",
                "admin.setRole",
                "user.delete",
                "user.getById",
                "user.list",
                "user.me",
                "user.search",
                "user.update",
            ]
        );
    }
}
