//! Chain orchestrator: walks an ordered sequence of adaptors fastest to
//! slowest, computes residual misses, back-fills faster tiers on a hit,
//! and summarizes per-request telemetry.
//!
//! Grounded on `original_source/cache.go` / `multicache.go` for the walk
//! and residual-key algorithms. Back-fill is performed here, by the chain,
//! rather than by each tier holding a "previous" reference to the one
//! above it — the N-tier, back-fill-to-every-faster-tier generalization is
//! grounded on `examples/thichuong-multi-tier-cache/src/cache_manager.rs`'s
//! promotion loop (`tiers.iter().take(tier_index).rev()`). Keeping the
//! chain external to each tier, rather than threading "previous" pointers
//! through construction, keeps tiers independently testable — see
//! DESIGN.md's Open Questions for the full reasoning.

use crate::adaptor::{Adaptor, MultiAdaptor, NewValueFn, Values};
use crate::error::Result;
use crate::record::Record;
use crate::telemetry::{Telemetry, TraceContext};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// Single-key chain orchestrator for one logical cache ("solution").
pub struct Chain<K, V> {
    name: String,
    adaptors: Vec<Arc<dyn Adaptor<K, V>>>,
    telemetry: Arc<dyn Telemetry>,
}

impl<K, V> Chain<K, V>
where
    K: Display + Send + Sync,
    V: Record,
{
    pub fn new(name: impl Into<String>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { name: name.into(), adaptors: Vec::new(), telemetry }
    }

    pub fn with_tier(mut self, adaptor: Arc<dyn Adaptor<K, V>>) -> Self {
        self.adaptors.push(adaptor);
        self
    }

    /// Walk adaptors in order; on a hit, stop and back-fill every faster
    /// tier visited before the one that hit. Returns `!dst.is_zero()` —
    /// negative entries suppress further lookups via their cached zero_ttl
    /// entry but never surface as a hit to the caller.
    pub async fn get(&self, key: &K, dst: &mut V) -> Result<bool> {
        let mut ctx = TraceContext::new(self.name.clone(), Arc::clone(&self.telemetry));
        let key_str = key.to_string();

        let mut hit_index = None;
        for (i, adaptor) in self.adaptors.iter().enumerate() {
            match adaptor.get(&mut ctx, key, dst).await {
                Ok(true) => {
                    hit_index = Some(i);
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(
                        solution = %self.name, adaptor = adaptor.name(), key = %key_str, error = %e,
                        "adaptor get failed, treating as miss"
                    );
                    continue;
                }
            }
        }

        let found = match hit_index {
            Some(i) => {
                self.backfill(&mut ctx, &self.adaptors[..i], &*dst).await;
                !dst.is_zero()
            }
            None => false,
        };

        ctx.finish();
        Ok(found)
    }

    async fn backfill(&self, ctx: &mut TraceContext, faster_tiers: &[Arc<dyn Adaptor<K, V>>], value: &V) {
        for tier in faster_tiers {
            if let Err(e) = tier.set(ctx, value).await {
                tracing::warn!(
                    solution = %self.name, adaptor = tier.name(), key = %value.key(), error = %e,
                    "backfill failed"
                );
            }
        }
    }

    /// Writes are strongly attempted across all tiers; the first error
    /// aborts and is returned.
    pub async fn set(&self, value: &V) -> Result<()> {
        let mut ctx = TraceContext::new(self.name.clone(), Arc::clone(&self.telemetry));
        for adaptor in &self.adaptors {
            if let Err(e) = adaptor.set(&mut ctx, value).await {
                tracing::error!(solution = %self.name, adaptor = adaptor.name(), error = %e, "adaptor set failed");
                ctx.finish();
                return Err(e);
            }
        }
        ctx.finish();
        Ok(())
    }

    pub async fn del(&self, key: &K) -> Result<()> {
        let mut ctx = TraceContext::new(self.name.clone(), Arc::clone(&self.telemetry));
        for adaptor in &self.adaptors {
            if let Err(e) = adaptor.del(&mut ctx, key).await {
                tracing::error!(solution = %self.name, adaptor = adaptor.name(), error = %e, "adaptor del failed");
                ctx.finish();
                return Err(e);
            }
        }
        ctx.finish();
        Ok(())
    }
}

/// Multi-key chain orchestrator.
pub struct MultiChain<K, V> {
    name: String,
    adaptors: Vec<Arc<dyn MultiAdaptor<K, V>>>,
    telemetry: Arc<dyn Telemetry>,
}

impl<K, V> MultiChain<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    V: Record + Clone,
{
    pub fn new(name: impl Into<String>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { name: name.into(), adaptors: Vec::new(), telemetry }
    }

    pub fn with_tier(mut self, adaptor: Arc<dyn MultiAdaptor<K, V>>) -> Self {
        self.adaptors.push(adaptor);
        self
    }

    /// Residual-key walk: each tier only receives keys not yet resolved by
    /// a faster tier. Zero-valued entries are stripped from `out` before
    /// returning — they were useful for short-circuiting the walk but are
    /// never surfaced to the caller.
    pub async fn get(
        &self,
        keys: &[K],
        out: &mut Values<K, V>,
        make_empty: &NewValueFn<V>,
    ) -> Result<()> {
        let mut ctx = TraceContext::new(self.name.clone(), Arc::clone(&self.telemetry));
        let mut residual: Vec<K> = keys.to_vec();

        for (i, adaptor) in self.adaptors.iter().enumerate() {
            if residual.is_empty() {
                break;
            }
            let before: std::collections::HashSet<K> = out.keys().cloned().collect();
            match adaptor.get(&mut ctx, &residual, out, make_empty).await {
                Ok(_resolved) => {}
                Err(e) => {
                    tracing::error!(
                        solution = %self.name, adaptor = adaptor.name(), error = %e,
                        "adaptor multi-get failed, treating as partial"
                    );
                }
            }

            let newly_produced: Vec<(K, V)> = out
                .iter()
                .filter(|(k, _)| !before.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.backfill(&mut ctx, &self.adaptors[..i], &newly_produced).await;

            if out.len() == keys.len() {
                break;
            }
            residual = keys.iter().filter(|k| !out.contains_key(*k)).cloned().collect();
        }

        out.retain(|_, v| !v.is_zero());
        ctx.finish();
        Ok(())
    }

    async fn backfill(
        &self,
        ctx: &mut TraceContext,
        faster_tiers: &[Arc<dyn MultiAdaptor<K, V>>],
        values: &[(K, V)],
    ) {
        if values.is_empty() {
            return;
        }
        let batch: Vec<V> = values.iter().map(|(_, v)| v.clone()).collect();
        for tier in faster_tiers {
            if let Err(e) = tier.set(ctx, &batch).await {
                tracing::warn!(solution = %self.name, adaptor = tier.name(), error = %e, "multi backfill failed");
            }
        }
    }

    pub async fn set(&self, values: &[V]) -> Result<()> {
        let mut ctx = TraceContext::new(self.name.clone(), Arc::clone(&self.telemetry));
        for adaptor in &self.adaptors {
            if let Err(e) = adaptor.set(&mut ctx, values).await {
                tracing::error!(solution = %self.name, adaptor = adaptor.name(), error = %e, "adaptor multi-set failed");
                ctx.finish();
                return Err(e);
            }
        }
        ctx.finish();
        Ok(())
    }

    pub async fn del(&self, keys: &[K]) -> Result<()> {
        let mut ctx = TraceContext::new(self.name.clone(), Arc::clone(&self.telemetry));
        for adaptor in &self.adaptors {
            if let Err(e) = adaptor.del(&mut ctx, keys).await {
                tracing::error!(solution = %self.name, adaptor = adaptor.name(), error = %e, "adaptor multi-del failed");
                ctx.finish();
                return Err(e);
            }
        }
        ctx.finish();
        Ok(())
    }
}
