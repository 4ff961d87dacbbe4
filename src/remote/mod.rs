//! Remote tier: KV-client backed adaptor with prefixed keys and jittered
//! TTL. No coherence bus — the store itself is shared truth among
//! processes.
//!
//! Grounded on `original_source/remote/redisadaptor.go`,
//! `redismultiadaptor.go`, `remote/option.go`; Redis I/O patterns follow
//! `examples/thichuong-multi-tier-cache/src/backends/redis_cache.rs`.

use crate::adaptor::{Adaptor, MultiAdaptor, NewValueFn, Values};
use crate::error::{CacheError, Result};
use crate::record::Record;
use crate::telemetry::{MetaEvent, TraceContext};
use crate::utils::SafeRand;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Defaults match `original_source/remote/option.go`.
#[derive(Clone)]
pub struct RemoteOptions {
    pub name: String,
    pub prefix: String,
    pub base_ttl: Duration,
    pub jitter_seconds: u64,
    pub zero_ttl: Duration,
    pub skip_get: bool,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            name: "remote".to_string(),
            prefix: "mulcache_local_".to_string(),
            base_ttl: Duration::from_secs(90),
            jitter_seconds: 5,
            zero_ttl: Duration::from_secs(5),
            skip_get: false,
        }
    }
}

impl RemoteOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_base_ttl(mut self, ttl: Duration) -> Self {
        self.base_ttl = ttl;
        self
    }

    pub fn with_jitter_seconds(mut self, secs: u64) -> Self {
        self.jitter_seconds = secs;
        self
    }

    pub fn with_zero_ttl(mut self, ttl: Duration) -> Self {
        self.zero_ttl = ttl;
        self
    }

    fn effective_ttl(&self, is_zero: bool, rng: &SafeRand) -> Duration {
        if is_zero {
            return self.zero_ttl;
        }
        self.base_ttl + Duration::from_secs(rng.gen_range_u64(self.jitter_seconds))
    }
}

/// Redis-backed single-key adaptor.
pub struct RemoteTier {
    options: RemoteOptions,
    conn: Mutex<redis::aio::ConnectionManager>,
    rng: SafeRand,
}

impl RemoteTier {
    pub async fn new(options: RemoteOptions, redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::TransientIo(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::TransientIo(e.to_string()))?;
        Ok(Self { options, conn: Mutex::new(conn), rng: SafeRand::new() })
    }

    pub fn with_connection(options: RemoteOptions, conn: redis::aio::ConnectionManager) -> Self {
        Self { options, conn: Mutex::new(conn), rng: SafeRand::new() }
    }

    fn stored_key(&self, key: &str) -> String {
        format!("{}{}", self.options.prefix, key)
    }
}

#[async_trait]
impl<K, V> Adaptor<K, V> for RemoteTier
where
    K: Display + Send + Sync,
    V: Record,
{
    fn name(&self) -> &str {
        &self.options.name
    }

    async fn get(&self, ctx: &mut TraceContext, key: &K, dst: &mut V) -> Result<bool> {
        let started = Instant::now();
        let key_str = key.to_string();

        if self.options.skip_get {
            ctx.record(self.name(), &key_str, MetaEvent::Miss, started);
            return Ok(false);
        }

        let stored_key = self.stored_key(&key_str);
        let mut conn = self.conn.lock().await;
        let bytes: Option<Vec<u8>> = conn
            .get(&stored_key)
            .await
            .map_err(|e| CacheError::TransientIo(e.to_string()))?;
        drop(conn);

        match bytes {
            Some(bytes) => {
                dst.deserialize(&bytes)?;
                ctx.record(self.name(), &key_str, MetaEvent::Hit, started);
                Ok(true)
            }
            None => {
                ctx.record(self.name(), &key_str, MetaEvent::Miss, started);
                Ok(false)
            }
        }
    }

    async fn set(&self, ctx: &mut TraceContext, value: &V) -> Result<()> {
        let started = Instant::now();
        let key_str = value.key();
        let stored_key = self.stored_key(&key_str);
        let bytes = value.serialize()?;
        let ttl = self.options.effective_ttl(value.is_zero(), &self.rng);

        let mut conn = self.conn.lock().await;
        let _: () = conn
            .set_ex(&stored_key, bytes, ttl.as_secs())
            .await
            .map_err(|e| CacheError::TransientIo(e.to_string()))?;
        drop(conn);
        ctx.record(self.name(), &key_str, MetaEvent::Set, started);
        Ok(())
    }

    async fn del(&self, _ctx: &mut TraceContext, key: &K) -> Result<()> {
        let stored_key = self.stored_key(&key.to_string());
        let mut conn = self.conn.lock().await;
        let _: () = conn.del(&stored_key).await.map_err(|e| CacheError::TransientIo(e.to_string()))?;
        Ok(())
    }
}

/// Redis-backed multi-key adaptor. No pipelining across keys — the
/// original (`redismultiadaptor.go`) documents this same limitation for
/// cluster-deployment compatibility.
pub struct RemoteMultiTier {
    inner: RemoteTier,
}

impl RemoteMultiTier {
    pub async fn new(options: RemoteOptions, redis_url: &str) -> Result<Self> {
        Ok(Self { inner: RemoteTier::new(options, redis_url).await? })
    }

    pub fn with_connection(options: RemoteOptions, conn: redis::aio::ConnectionManager) -> Self {
        Self { inner: RemoteTier::with_connection(options, conn) }
    }
}

#[async_trait]
impl<K, V> MultiAdaptor<K, V> for RemoteMultiTier
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    V: Record,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(
        &self,
        ctx: &mut TraceContext,
        keys: &[K],
        out: &mut Values<K, V>,
        make_empty: &NewValueFn<V>,
    ) -> Result<Vec<K>> {
        let mut resolved = Vec::new();
        for key in keys {
            let mut dst = make_empty();
            match Adaptor::<K, V>::get(&self.inner, ctx, key, &mut dst).await {
                Ok(true) => {
                    out.insert(key.clone(), dst);
                    resolved.push(key.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(tier = self.name(), key = %key, error = %e, "remote multi-get failed");
                }
            }
        }
        Ok(resolved)
    }

    async fn set(&self, ctx: &mut TraceContext, values: &[V]) -> Result<()> {
        for value in values {
            Adaptor::<K, V>::set(&self.inner, ctx, value).await?;
        }
        Ok(())
    }

    async fn del(&self, ctx: &mut TraceContext, keys: &[K]) -> Result<()> {
        for key in keys {
            Adaptor::<K, V>::del(&self.inner, ctx, key).await?;
        }
        Ok(())
    }
}
