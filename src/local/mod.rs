//! Local tier: byte-store backed adaptor with prefixed keys, jittered TTL,
//! and an optional coherence-bus subscription.
//!
//! Grounded on `original_source/local/freecacheadaptor.go`,
//! `freecacheadmultiaptor.go`, and `local/option.go`. Back-fill to faster
//! tiers is performed by the chain orchestrator rather than by each tier
//! holding a "previous" reference — see DESIGN.md's Open Questions for why
//! this crate takes the alternative the original's Design Notes recommend.

mod store;

pub use store::{ByteStore, MokaByteStore};

use crate::adaptor::{Adaptor, MultiAdaptor, NewValueFn, Values};
use crate::error::{CacheError, Result};
use crate::record::Record;
use crate::syncer::{CacheSyncEvent, EventType, Syncer};
use crate::telemetry::{MetaEvent, TraceContext};
use crate::utils::SafeRand;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-tier configuration. Defaults match `original_source/local/option.go`.
#[derive(Clone)]
pub struct LocalOptions {
    pub name: String,
    pub prefix: String,
    pub base_ttl: Duration,
    pub jitter_span: Duration,
    pub zero_ttl: Duration,
    /// If set, `get` always reports a miss without touching the store —
    /// useful for a tier that exists only to receive back-fills.
    pub skip_get: bool,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            prefix: "multicache_local_".to_string(),
            base_ttl: Duration::from_secs(30),
            jitter_span: Duration::from_secs(5),
            zero_ttl: Duration::from_secs(5),
            skip_get: false,
        }
    }
}

impl LocalOptions {
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

    pub fn with_jitter_span(mut self, span: Duration) -> Self {
        self.jitter_span = span;
        self
    }

    pub fn with_zero_ttl(mut self, ttl: Duration) -> Self {
        self.zero_ttl = ttl;
        self
    }

    pub fn with_skip_get(mut self, skip: bool) -> Self {
        self.skip_get = skip;
        self
    }

    fn effective_ttl(&self, is_zero: bool, rng: &SafeRand) -> Duration {
        if is_zero {
            return self.zero_ttl;
        }
        self.base_ttl + Duration::from_millis(rng.gen_range_u64(self.jitter_span.as_millis() as u64))
    }
}

/// Byte-store backed single-key adaptor.
pub struct LocalTier {
    options: LocalOptions,
    store: Arc<dyn ByteStore>,
    bus: Option<Arc<dyn Syncer>>,
    rng: SafeRand,
}

impl LocalTier {
    pub fn new(options: LocalOptions, store: Arc<dyn ByteStore>) -> Self {
        Self { options, store, bus: None, rng: SafeRand::new() }
    }

    /// Attach a coherence bus and subscribe for Add/Delete events from
    /// peers, mirroring the original's constructor-subscribes pattern
    /// (`freecacheadaptor.go`'s `New` calling `syncer.Subscribe`).
    pub fn with_bus(mut self, bus: Arc<dyn Syncer>) -> Self {
        let store = Arc::clone(&self.store);
        let prefix = self.options.prefix.clone();
        let name = self.options.name.clone();
        bus.subscribe(Arc::new(move |event: CacheSyncEvent| {
            let store = Arc::clone(&store);
            let prefix = prefix.clone();
            let name = name.clone();
            Box::pin(async move {
                let stored_key = format!("{prefix}{}", event.key);
                match event.event_type {
                    EventType::Add => {
                        let bytes = event
                            .value_bytes()?
                            .ok_or_else(|| CacheError::DecodeFailure("add event missing val".into()))?;
                        let ttl = Duration::from_secs(event.ttl.unwrap_or(0));
                        store.set(&stored_key, Bytes::from(bytes), ttl).await.map_err(|e| {
                            tracing::warn!(tier = %name, key = %event.key, error = %e, "coherence apply failed");
                            e
                        })?;
                    }
                    EventType::Delete => {
                        store.del(&stored_key).await?;
                    }
                }
                Ok(())
            })
        }));
        self.bus = Some(bus);
        self
    }

    fn stored_key(&self, key: &str) -> String {
        format!("{}{}", self.options.prefix, key)
    }

    async fn publish(&self, event: CacheSyncEvent) {
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.emit(event).await {
                tracing::warn!(tier = %self.options.name, error = %e, "coherence emit failed");
            }
        }
    }
}

#[async_trait]
impl<K, V> Adaptor<K, V> for LocalTier
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
        match self.store.get(&stored_key).await {
            Ok(Some(bytes)) => {
                dst.deserialize(&bytes)?;
                ctx.record(self.name(), &key_str, MetaEvent::Hit, started);
                Ok(true)
            }
            Ok(None) => {
                ctx.record(self.name(), &key_str, MetaEvent::Miss, started);
                Ok(false)
            }
            Err(e) => {
                ctx.record(self.name(), &key_str, MetaEvent::Miss, started);
                Err(e)
            }
        }
    }

    async fn set(&self, ctx: &mut TraceContext, value: &V) -> Result<()> {
        let started = Instant::now();
        let key_str = value.key();
        let stored_key = self.stored_key(&key_str);
        let bytes = value.serialize()?;
        let ttl = self.options.effective_ttl(value.is_zero(), &self.rng);

        self.store.set(&stored_key, Bytes::from(bytes.clone()), ttl).await?;
        ctx.record(self.name(), &key_str, MetaEvent::Set, started);

        self.publish(CacheSyncEvent::add(
            self.bus.as_ref().map(|b| b.client_id().to_string()).unwrap_or_default(),
            &key_str,
            &bytes,
            ttl,
        ))
        .await;
        Ok(())
    }

    async fn del(&self, _ctx: &mut TraceContext, key: &K) -> Result<()> {
        let key_str = key.to_string();
        let stored_key = self.stored_key(&key_str);
        self.store.del(&stored_key).await?;
        self.publish(CacheSyncEvent::delete(
            self.bus.as_ref().map(|b| b.client_id().to_string()).unwrap_or_default(),
            &key_str,
        ))
        .await;
        Ok(())
    }
}

/// Byte-store backed multi-key adaptor. The embedded store has no native
/// multi-get, so this loops per key — matching
/// `original_source/local/freecacheadmultiaptor.go`.
pub struct LocalMultiTier {
    inner: LocalTier,
}

impl LocalMultiTier {
    pub fn new(options: LocalOptions, store: Arc<dyn ByteStore>) -> Self {
        Self { inner: LocalTier::new(options, store) }
    }

    pub fn with_bus(mut self, bus: Arc<dyn Syncer>) -> Self {
        self.inner = self.inner.with_bus(bus);
        self
    }
}

#[async_trait]
impl<K, V> MultiAdaptor<K, V> for LocalMultiTier
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
                    tracing::error!(tier = self.name(), key = %key, error = %e, "local multi-get failed");
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
