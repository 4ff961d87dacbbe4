//! Uniform Get/Set/Del surface for one tier, single-key and multi-key.
//!
//! Grounded on `original_source/adaptor/adaptor.go` and
//! `adaptor/multiadaptor.go`; the async/trait-object shape follows
//! `examples/thichuong-multi-tier-cache/src/traits.rs`'s `CacheBackend`.

use crate::error::Result;
use crate::record::Record;
use crate::telemetry::TraceContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;

/// One storage layer in a chain. `name()` must be unique within a chain —
/// it is used as a telemetry dimension and in coherence-bus self-loop
/// suppression logs.
#[async_trait]
pub trait Adaptor<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Record,
{
    fn name(&self) -> &str;

    /// Look up `key`, deserializing a hit into `dst`. Returns `Ok(true)` on
    /// a hit (including a negative/zero hit — callers decide what "found"
    /// means to them), `Ok(false)` on a miss, `Err` on I/O/decode failure.
    async fn get(&self, ctx: &mut TraceContext, key: &K, dst: &mut V) -> Result<bool>;

    /// Store `value` in this tier.
    async fn set(&self, ctx: &mut TraceContext, value: &V) -> Result<()>;

    /// Remove `key` from this tier.
    async fn del(&self, ctx: &mut TraceContext, key: &K) -> Result<()>;
}

/// A batch of values returned by a multi-key tier, keyed by `K`.
pub type Values<K, V> = HashMap<K, V>;

/// Factory producing a fresh, empty record for deserialization — the
/// multi-key equivalent of `V::default()` when `V` isn't `Default` (e.g.
/// when construction needs arguments).
pub type NewValueFn<V> = dyn Fn() -> V + Send + Sync;

/// Multi-key counterpart of [`Adaptor`].
#[async_trait]
pub trait MultiAdaptor<K, V>: Send + Sync
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Record,
{
    fn name(&self) -> &str;

    /// Look up `keys`, inserting every hit into `out`. Returns the subset of
    /// `keys` that were resolved (hit or negative hit) by this tier; the
    /// orchestrator uses this to compute the residual for the next tier.
    async fn get(
        &self,
        ctx: &mut TraceContext,
        keys: &[K],
        out: &mut Values<K, V>,
        make_empty: &NewValueFn<V>,
    ) -> Result<Vec<K>>;

    async fn set(&self, ctx: &mut TraceContext, values: &[V]) -> Result<()>;

    async fn del(&self, ctx: &mut TraceContext, keys: &[K]) -> Result<()>;
}
