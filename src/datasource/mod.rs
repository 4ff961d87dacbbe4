//! Data-source tier: the read-only authoritative loader, with deduplicated
//! concurrent loading and a bounded-wait fallback so a slow loader cannot
//! stall every caller indefinitely.
//!
//! Grounded on `original_source/datasource/datasourceadaptor.go` (the
//! goroutine + buffered-channel + `select` deadline race, translated to
//! `tokio::spawn` + `tokio::select!`/`tokio::time::sleep`) and
//! `datasourcemultiadaptor.go` (multi-key variant, explicitly not
//! single-flighted — see DESIGN.md's Open Questions).

mod coalescer;

pub use coalescer::Coalescer;

use crate::adaptor::{Adaptor, MultiAdaptor, NewValueFn, Values};
use crate::error::{CacheError, Result};
use crate::record::Record;
use crate::telemetry::{MetaEvent, TraceContext};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Single-key loader: `key -> Ok(Some(value))` on hit, `Ok(None)` for a
/// confirmed absence (the original's `ErrNotFound` sentinel), `Err` for a
/// real failure.
pub type LoaderFn<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<Option<V>>> + Send + Sync>;

/// Multi-key loader: returns every key it could resolve. Keys absent from
/// the returned map are treated as misses, not errors.
pub type MultiLoaderFn<K, V> = Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, Result<HashMap<K, V>>> + Send + Sync>;

#[derive(Clone)]
pub struct DataSourceOptions {
    pub name: String,
    /// Caps how long a caller waits on a co-shared in-flight load before
    /// falling back to an independent direct loader call. Default: 200ms,
    /// matching `original_source/datasource/option.go`.
    pub single_flight_wait: Duration,
}

impl Default for DataSourceOptions {
    fn default() -> Self {
        Self { name: "datasource".to_string(), single_flight_wait: Duration::from_millis(200) }
    }
}

impl DataSourceOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_single_flight_wait(mut self, wait: Duration) -> Self {
        self.single_flight_wait = wait;
        self
    }
}

/// Runs `loader(key)`, catching a panic inside it and translating it into
/// a [`CacheError::LoaderError`] rather than letting it cross the task
/// boundary.
async fn call_loader_catching_panics<K, V>(loader: LoaderFn<K, V>, key: K) -> Result<Option<Vec<u8>>>
where
    K: Send + 'static,
    V: Record + 'static,
{
    let join = tokio::spawn(async move {
        let value = loader(key).await?;
        match value {
            Some(v) => Ok(Some(v.serialize()?)),
            None => Ok(None),
        }
    })
    .await;

    match join {
        Ok(res) => res,
        Err(join_err) => Err(CacheError::LoaderError(format!("loader panicked: {join_err}"))),
    }
}

/// Single-key data-source adaptor. `set`/`del` are no-ops: the data source
/// is authoritative and never written by the cache.
pub struct DataSourceTier<K, V> {
    options: DataSourceOptions,
    loader: LoaderFn<K, V>,
    coalescer: Coalescer,
}

impl<K, V> DataSourceTier<K, V>
where
    K: Display + Clone + Send + Sync + 'static,
    V: Record + 'static,
{
    pub fn new(options: DataSourceOptions, loader: LoaderFn<K, V>) -> Self {
        Self { options, loader, coalescer: Coalescer::new() }
    }
}

#[async_trait]
impl<K, V> Adaptor<K, V> for DataSourceTier<K, V>
where
    K: Display + Clone + Send + Sync + 'static,
    V: Record + 'static,
{
    fn name(&self) -> &str {
        &self.options.name
    }

    async fn get(&self, ctx: &mut TraceContext, key: &K, dst: &mut V) -> Result<bool> {
        let started = Instant::now();
        let key_str = key.to_string();
        let group_key = key_str.clone();

        let loader = Arc::clone(&self.loader);
        let key_for_leader = key.clone();
        let coalescer = self.coalescer.clone();
        let shared_attempt = tokio::spawn(async move {
            coalescer
                .do_request(&group_key, move || call_loader_catching_panics(loader, key_for_leader))
                .await
        });

        let outcome = tokio::select! {
            res = shared_attempt => {
                match res {
                    Ok(loaded) => loaded,
                    Err(join_err) => Err(CacheError::LoaderError(format!("single-flight task failed: {join_err}"))),
                }
            }
            _ = tokio::time::sleep(self.options.single_flight_wait) => {
                // Deadline won: fall back to an independent direct load,
                // bypassing the group entirely. The shared attempt keeps
                // running in the background for any other followers.
                let loader = Arc::clone(&self.loader);
                call_loader_catching_panics(loader, key.clone()).await
            }
        };

        match outcome {
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

    async fn set(&self, _ctx: &mut TraceContext, _value: &V) -> Result<()> {
        Ok(())
    }

    async fn del(&self, _ctx: &mut TraceContext, _key: &K) -> Result<()> {
        Ok(())
    }
}

/// Multi-key data-source adaptor. Deliberately not single-flighted — see
/// DESIGN.md's Open Questions.
pub struct DataSourceMultiTier<K, V> {
    options: DataSourceOptions,
    loader: MultiLoaderFn<K, V>,
}

impl<K, V> DataSourceMultiTier<K, V> {
    pub fn new(options: DataSourceOptions, loader: MultiLoaderFn<K, V>) -> Self {
        Self { options, loader }
    }
}

#[async_trait]
impl<K, V> MultiAdaptor<K, V> for DataSourceMultiTier<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Record + 'static,
{
    fn name(&self) -> &str {
        &self.options.name
    }

    async fn get(
        &self,
        ctx: &mut TraceContext,
        keys: &[K],
        out: &mut Values<K, V>,
        _make_empty: &NewValueFn<V>,
    ) -> Result<Vec<K>> {
        let started = Instant::now();
        let loaded = (self.loader)(keys.to_vec()).await?;
        let mut resolved = Vec::with_capacity(loaded.len());
        for (key, value) in loaded {
            ctx.record(self.name(), &key.to_string(), MetaEvent::Hit, started);
            resolved.push(key.clone());
            out.insert(key, value);
        }
        Ok(resolved)
    }

    async fn set(&self, _ctx: &mut TraceContext, _values: &[V]) -> Result<()> {
        Ok(())
    }

    async fn del(&self, _ctx: &mut TraceContext, _keys: &[K]) -> Result<()> {
        Ok(())
    }
}
