//! Short-lived in-process cache of resolved sessions.
//!
//! Entries are keyed by token hash and live until `cached_until`, which never
//! exceeds the session's own expiry. The cache is per process and not
//! coordinated across instances; staleness is bounded by the TTL.
//!
//! Size is capped: a full cache first sweeps expired entries, then evicts the
//! entry closest to its own expiry.

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ResolvedSession;

/// Default number of cached sessions per process.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct SessionCache {
    ttl_seconds: i64,
    capacity: usize,
    entries: RwLock<HashMap<Vec<u8>, ResolvedSession>>,
}

impl SessionCache {
    /// A TTL of zero disables caching.
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self::with_capacity(ttl_seconds, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(ttl_seconds: i64, capacity: usize) -> Self {
        Self {
            ttl_seconds: ttl_seconds.max(0),
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub async fn get(&self, token_hash: &[u8], now: i64) -> Option<ResolvedSession> {
        let entries = self.entries.read().await;
        entries
            .get(token_hash)
            .filter(|entry| entry.session.cached_until > now && entry.session.expires_at > now)
            .cloned()
    }

    /// Cache a resolution, stamping `cached_until` on the stored copy.
    pub async fn insert(&self, mut resolved: ResolvedSession, now: i64) -> ResolvedSession {
        resolved.session.cached_until = now
            .saturating_add(self.ttl_seconds)
            .min(resolved.session.expires_at);
        if self.ttl_seconds == 0 {
            return resolved;
        }
        let mut entries = self.entries.write().await;
        let key = resolved.session.token_hash.clone();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| entry.session.cached_until > now);
            while entries.len() >= self.capacity {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.session.cached_until)
                    .map(|(hash, _)| hash.clone())
                else {
                    break;
                };
                entries.remove(&oldest);
            }
        }
        entries.insert(key, resolved.clone());
        resolved
    }

    pub async fn invalidate(&self, token_hash: &[u8]) {
        self.entries.write().await.remove(token_hash);
    }

    pub async fn invalidate_user(&self, user_id: Uuid) {
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.session.user_id != user_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::users::User;

    fn resolved(token_hash: &[u8], user_id: Uuid, expires_at: i64) -> ResolvedSession {
        ResolvedSession {
            session: Session {
                token_hash: token_hash.to_vec(),
                user_id,
                issued_at: 0,
                expires_at,
                cached_until: 0,
            },
            user: User {
                id: user_id,
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                email_verified: true,
                role: None,
                banned: false,
                image: None,
                created_at: 0,
            },
        }
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = SessionCache::new(60);
        let user_id = Uuid::new_v4();
        let stored = cache.insert(resolved(b"a", user_id, 10_000), 100).await;
        assert_eq!(stored.session.cached_until, 160);
        assert!(cache.get(b"a", 159).await.is_some());
        assert!(cache.get(b"a", 160).await.is_none());
    }

    #[tokio::test]
    async fn cached_until_never_exceeds_session_expiry() {
        let cache = SessionCache::new(300);
        let stored = cache.insert(resolved(b"a", Uuid::new_v4(), 130), 100).await;
        assert_eq!(stored.session.cached_until, 130);
        assert!(cache.get(b"a", 130).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_user_drops_all_their_sessions() {
        let cache = SessionCache::new(60);
        let ada = Uuid::new_v4();
        let bob = Uuid::new_v4();
        cache.insert(resolved(b"a1", ada, 1_000), 0).await;
        cache.insert(resolved(b"a2", ada, 1_000), 0).await;
        cache.insert(resolved(b"b1", bob, 1_000), 0).await;
        cache.invalidate_user(ada).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(b"b1", 1).await.is_some());
        cache.invalidate(b"b1").await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = SessionCache::new(0);
        cache.insert(resolved(b"a", Uuid::new_v4(), 1_000), 0).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn full_cache_evicts_the_entry_nearest_expiry() {
        let cache = SessionCache::with_capacity(60, 2);
        cache.insert(resolved(b"a", Uuid::new_v4(), 1_000), 0).await;
        cache.insert(resolved(b"b", Uuid::new_v4(), 1_000), 10).await;
        // Both entries are still live; the one cached first goes.
        cache.insert(resolved(b"c", Uuid::new_v4(), 1_000), 20).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(b"a", 21).await.is_none());
        assert!(cache.get(b"b", 21).await.is_some());
        assert!(cache.get(b"c", 21).await.is_some());

        // Refreshing a cached entry never evicts another one.
        cache.insert(resolved(b"c", Uuid::new_v4(), 1_000), 30).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(b"b", 31).await.is_some());
    }

    #[tokio::test]
    async fn full_cache_sweeps_expired_entries_first() {
        let cache = SessionCache::with_capacity(60, 2);
        cache.insert(resolved(b"a", Uuid::new_v4(), 1_000), 0).await;
        cache.insert(resolved(b"b", Uuid::new_v4(), 1_000), 50).await;
        // "a" expired at 60; "b" is live until 110.
        cache.insert(resolved(b"c", Uuid::new_v4(), 1_000), 70).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(b"b", 71).await.is_some());
        assert!(cache.get(b"c", 71).await.is_some());
    }
}
