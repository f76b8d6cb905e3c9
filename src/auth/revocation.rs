//! Registry of revoked token ids.
//!
//! Each record remembers the revoked token's own `exp`. Once that instant has
//! passed the codec rejects the token anyway, so the record can be dropped:
//! the in-memory store prunes on a timer (see `jobs::revocation_sweep`), the
//! Redis store sets a matching key TTL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    pub jti: String,
    pub revoked_at: DateTime<Utc>,
    /// `exp` of the revoked token
    pub expires_at: DateTime<Utc>,
}

impl RevocationRecord {
    pub fn new(jti: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            jti: jti.into(),
            revoked_at: Utc::now(),
            expires_at,
        }
    }

    /// Seconds the record must outlive `now`, or `None` once the token is
    /// unusable. The codec compares `exp` against whole seconds, so a token
    /// is still accepted during the second its `exp` names.
    pub fn ttl_at(&self, now: DateTime<Utc>) -> Option<u64> {
        let exp = self.expires_at.timestamp();
        let now = now.timestamp();
        if exp < now {
            return None;
        }
        Some((exp - now + 1) as u64)
    }
}

/// Once `add` returns, every later `contains` for the same `jti` from any
/// task returns `true` (until the record is pruned after its token expired).
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn add(&self, record: RevocationRecord) -> Result<(), AppError>;

    async fn contains(&self, jti: &str) -> Result<bool, AppError>;

    /// Drop records whose token expired before `now`. Returns how many were removed.
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError>;
}

// ── In-memory ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryRevocationStore {
    records: Arc<DashMap<String, RevocationRecord>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn add(&self, record: RevocationRecord) -> Result<(), AppError> {
        self.records.insert(record.jti.clone(), record);
        Ok(())
    }

    async fn contains(&self, jti: &str) -> Result<bool, AppError> {
        Ok(self.records.contains_key(jti))
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let before = self.records.len();
        self.records.retain(|_, record| record.ttl_at(now).is_some());
        Ok(before.saturating_sub(self.records.len()))
    }
}

// ── Redis ────────────────────────────────────────────────────

const KEY_PREFIX: &str = "crawldeck:revoked:";

/// Shares revocations across processes. Keys expire together with the token.
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn key(jti: &str) -> String {
        format!("{}{}", KEY_PREFIX, jti)
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn add(&self, record: RevocationRecord) -> Result<(), AppError> {
        let Some(ttl) = record.ttl_at(Utc::now()) else {
            // token already unusable
            return Ok(());
        };
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(
            Self::key(&record.jti),
            record.revoked_at.timestamp(),
            ttl,
        )
        .await?;
        Ok(())
    }

    async fn contains(&self, jti: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::key(jti)).await?;
        Ok(exists)
    }

    async fn prune_expired(&self, _now: DateTime<Utc>) -> Result<usize, AppError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_add_then_contains() {
        let store = MemoryRevocationStore::new();
        assert!(!store.contains("jti-1").await.unwrap());

        store
            .add(RevocationRecord::new("jti-1", Utc::now() + Duration::hours(1)))
            .await
            .unwrap();
        assert!(store.contains("jti-1").await.unwrap());
        assert!(!store.contains("jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_only_drops_expired_records() {
        let store = MemoryRevocationStore::new();
        let now = Utc::now();
        store
            .add(RevocationRecord::new("old", now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .add(RevocationRecord::new("live", now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.prune_expired(now).await.unwrap(), 1);
        assert!(!store.contains("old").await.unwrap());
        assert!(store.contains("live").await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_keeps_record_through_its_exp_second() {
        let store = MemoryRevocationStore::new();
        let second = Utc::now().timestamp();
        let exp = Utc.timestamp_opt(second, 0).unwrap();
        store.add(RevocationRecord::new("edge", exp)).await.unwrap();

        let mid_second = Utc.timestamp_opt(second, 600_000_000).unwrap();
        assert_eq!(store.prune_expired(mid_second).await.unwrap(), 0);
        assert!(store.contains("edge").await.unwrap());

        let next_second = Utc.timestamp_opt(second + 1, 0).unwrap();
        assert_eq!(store.prune_expired(next_second).await.unwrap(), 1);
    }

    #[test]
    fn test_ttl_covers_codec_granularity() {
        let t = 1_700_000_000;
        let now = Utc.timestamp_opt(t, 300_000_000).unwrap();
        let record = |exp: i64| RevocationRecord::new("j", Utc.timestamp_opt(exp, 0).unwrap());

        // under one wall-clock second left, still stored
        assert_eq!(record(t + 1).ttl_at(now), Some(2));
        assert_eq!(record(t).ttl_at(now), Some(1));
        assert_eq!(record(t - 1).ttl_at(now), None);
        assert_eq!(record(t + 3600).ttl_at(now), Some(3601));
    }

    #[tokio::test]
    async fn test_readding_is_idempotent() {
        let store = MemoryRevocationStore::new();
        let exp = Utc::now() + Duration::hours(1);
        store.add(RevocationRecord::new("dup", exp)).await.unwrap();
        store.add(RevocationRecord::new("dup", exp)).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_visible_to_all_tasks() {
        let store = MemoryRevocationStore::new();
        let exp = Utc::now() + Duration::hours(1);

        let mut handles = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let jti = format!("jti-{}", i);
                store.add(RevocationRecord::new(jti.clone(), exp)).await.unwrap();
                // visible immediately to the writer
                assert!(store.contains(&jti).await.unwrap());
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for i in 0..64 {
            assert!(store.contains(&format!("jti-{}", i)).await.unwrap());
        }
        assert_eq!(store.len(), 64);
    }
}
