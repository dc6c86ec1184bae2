//! In-process backend for tests and local development.
//!
//! Data lives behind a single `RwLock`; nothing is persisted across restarts.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CreateUserOutcome, NewUser, ProfileUpdate, SessionRecord, SessionStore, Store, TokenKind,
    TokenStore, UserPage, UserRecord, UserStore, now_unix_seconds,
};

#[derive(Debug)]
struct TokenEntry {
    kind: TokenKind,
    user_id: Uuid,
    expires_at_unix: i64,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, UserRecord>,
    // Insertion order doubles as creation order for pagination.
    user_order: Vec<Uuid>,
    sessions: HashMap<Vec<u8>, SessionRecord>,
    tokens: HashMap<Vec<u8>, TokenEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, handy for asserting revocation.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

fn update_user<F>(state: &mut State, id: Uuid, apply: F) -> Option<UserRecord>
where
    F: FnOnce(&mut UserRecord),
{
    let user = state.users.get_mut(&id)?;
    apply(user);
    Some(user.clone())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let mut state = self.state.write().await;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            email_verified: false,
            role: None,
            banned: false,
            image: None,
            password_hash: user.password_hash,
            created_at_unix: now_unix_seconds(),
        };
        state.user_order.push(record.id);
        state.users.insert(record.id, record.clone());
        Ok(CreateUserOutcome::Created(record))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<UserPage> {
        let state = self.state.read().await;
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        let users = state
            .user_order
            .iter()
            .rev()
            .filter_map(|id| state.users.get(id))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(UserPage {
            users,
            total: i64::try_from(state.users.len()).unwrap_or(i64::MAX),
        })
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserRecord>> {
        let state = self.state.read().await;
        let needle = query.to_lowercase();
        let mut matches: Vec<UserRecord> = state
            .users
            .values()
            .filter(|user| user.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        matches.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(matches)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<UserRecord>> {
        let mut state = self.state.write().await;
        Ok(update_user(&mut state, id, |user| {
            if let Some(name) = update.name {
                user.name = name;
            }
            if let Some(image) = update.image {
                user.image = Some(image);
            }
        }))
    }

    async fn set_role(&self, id: Uuid, role: Option<String>) -> Result<Option<UserRecord>> {
        let mut state = self.state.write().await;
        Ok(update_user(&mut state, id, |user| user.role = role))
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> Result<Option<UserRecord>> {
        let mut state = self.state.write().await;
        Ok(update_user(&mut state, id, |user| user.banned = banned))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(update_user(&mut state, id, |user| {
            user.password_hash = password_hash.to_string();
        })
        .is_some())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(update_user(&mut state, id, |user| user.email_verified = true).is_some())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        state.user_order.retain(|existing| *existing != id);
        state.sessions.retain(|_, session| session.user_id != id);
        state.tokens.retain(|_, token| token.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<SessionRecord> {
        let now = now_unix_seconds();
        let record = SessionRecord {
            user_id,
            issued_at_unix: now,
            expires_at_unix: now.saturating_add(ttl_seconds),
        };
        self.state
            .write()
            .await
            .sessions
            .insert(token_hash.to_vec(), record.clone());
        Ok(record)
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let now = now_unix_seconds();
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(token_hash)
            .filter(|session| session.expires_at_unix > now)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        self.state.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.user_id != user_id);
        Ok(u64::try_from(before - state.sessions.len()).unwrap_or(0))
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let entry = TokenEntry {
            kind,
            user_id,
            expires_at_unix: now_unix_seconds().saturating_add(ttl_seconds),
        };
        self.state
            .write()
            .await
            .tokens
            .insert(token_hash.to_vec(), entry);
        Ok(())
    }

    async fn consume_token(&self, kind: TokenKind, token_hash: &[u8]) -> Result<Option<Uuid>> {
        let mut state = self.state.write().await;
        let matches_kind = state
            .tokens
            .get(token_hash)
            .is_some_and(|entry| entry.kind == kind);
        if !matches_kind {
            return Ok(None);
        }
        let now = now_unix_seconds();
        Ok(state
            .tokens
            .remove(token_hash)
            .filter(|entry| entry.expires_at_unix > now)
            .map(|entry| entry.user_id))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    async fn create(store: &MemoryStore, name: &str, email: &str) -> Result<UserRecord> {
        match store.create_user(new_user(name, email)).await? {
            CreateUserOutcome::Created(user) => Ok(user),
            CreateUserOutcome::Conflict => anyhow::bail!("unexpected conflict"),
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() -> Result<()> {
        let store = MemoryStore::new();
        create(&store, "Ada", "ada@example.com").await?;
        let outcome = store.create_user(new_user("Ada 2", "ada@example.com")).await?;
        assert!(matches!(outcome, CreateUserOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn list_users_is_newest_first_and_paginated() -> Result<()> {
        let store = MemoryStore::new();
        for i in 0..5 {
            create(&store, &format!("user{i}"), &format!("u{i}@example.com")).await?;
        }
        let page = store.list_users(1, 2).await?;
        assert_eq!(page.total, 5);
        let names: Vec<_> = page.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["user3", "user2"]);
        Ok(())
    }

    #[tokio::test]
    async fn search_users_is_case_insensitive_and_limited() -> Result<()> {
        let store = MemoryStore::new();
        create(&store, "Grace Hopper", "grace@example.com").await?;
        create(&store, "Grace Kelly", "kelly@example.com").await?;
        create(&store, "Alan Turing", "alan@example.com").await?;
        let found = store.search_users("grace", 1).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(store.search_users("GRACE", 10).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_are_not_returned() -> Result<()> {
        let store = MemoryStore::new();
        let user = create(&store, "Ada", "ada@example.com").await?;
        store.insert_session(b"live", user.id, 60).await?;
        store.insert_session(b"dead", user.id, -1).await?;
        assert!(store.lookup_session(b"live").await?.is_some());
        assert!(store.lookup_session(b"dead").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_user_cascades_sessions_and_tokens() -> Result<()> {
        let store = MemoryStore::new();
        let user = create(&store, "Ada", "ada@example.com").await?;
        store.insert_session(b"session", user.id, 60).await?;
        store
            .insert_token(TokenKind::PasswordReset, user.id, b"token", 60)
            .await?;
        assert!(store.delete_user(user.id).await?);
        assert_eq!(store.session_count().await, 0);
        assert!(
            store
                .consume_token(TokenKind::PasswordReset, b"token")
                .await?
                .is_none()
        );
        assert!(!store.delete_user(user.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn consume_token_is_single_use_and_kind_checked() -> Result<()> {
        let store = MemoryStore::new();
        let user = create(&store, "Ada", "ada@example.com").await?;
        store
            .insert_token(TokenKind::EmailVerification, user.id, b"token", 60)
            .await?;
        assert!(
            store
                .consume_token(TokenKind::PasswordReset, b"token")
                .await?
                .is_none()
        );
        assert_eq!(
            store
                .consume_token(TokenKind::EmailVerification, b"token")
                .await?,
            Some(user.id)
        );
        assert!(
            store
                .consume_token(TokenKind::EmailVerification, b"token")
                .await?
                .is_none()
        );
        Ok(())
    }
}
