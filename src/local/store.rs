//! Embedded byte-store dependency backing the local tier.
//!
//! Generalizes `examples/thichuong-multi-tier-cache/src/backends/moka_cache.rs`'s
//! moka usage from a fixed `serde_json::Value` payload down to raw bytes.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use std::time::Duration;

/// A bounded, TTL-aware byte store. `set` takes an explicit per-call TTL
/// (the jittered value computed by the local tier) rather than a single
/// cache-wide TTL.
#[async_trait]
pub trait ByteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
}

/// Moka-backed [`ByteStore`]. Per-entry TTL is implemented via
/// `moka::Expiry` since `moka::future::Cache`'s builder-level `time_to_live`
/// is a single cache-wide policy and each Set needs its own TTL.
pub struct MokaByteStore {
    cache: Cache<String, (Bytes, std::time::Instant)>,
}

struct PerEntryExpiry;

impl moka::Expiry<String, (Bytes, std::time::Instant)> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(Bytes, std::time::Instant),
        created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.1.saturating_duration_since(created_at).max(Duration::from_millis(1)))
    }

    /// Without this override, moka's default keeps the *old* entry's
    /// remaining TTL on a re-`insert`, so overwriting an existing key with
    /// a freshly computed TTL (e.g. a positive entry replaced by a
    /// zero-record, or a peer `Add` carrying its own TTL) would silently
    /// keep expiring on the stale schedule.
    fn expire_after_update(
        &self,
        _key: &String,
        value: &(Bytes, std::time::Instant),
        updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1.saturating_duration_since(updated_at).max(Duration::from_millis(1)))
    }
}

impl MokaByteStore {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();
        Self { cache }
    }
}

impl Default for MokaByteStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl ByteStore for MokaByteStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.cache.get(key).await.map(|(bytes, _)| bytes))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let expires_at = std::time::Instant::now() + ttl;
        self.cache.insert(key.to_string(), (value, expires_at)).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.cache.remove(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MokaByteStore::new(100);
        store.set("k1", Bytes::from_static(b"v1"), Duration::from_secs(60)).await.unwrap();
        let got = store.get("k1").await.unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"v1")));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = MokaByteStore::new(100);
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let store = MokaByteStore::new(100);
        store.set("k1", Bytes::from_static(b"v1"), Duration::from_secs(60)).await.unwrap();
        store.del("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);
    }
}
