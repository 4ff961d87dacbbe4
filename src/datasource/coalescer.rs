//! Single-flight group: at most one loader call in flight per key, per
//! process, at any instant.
//!
//! Grounded on `examples/setulabs-skp-cache/crates/skp-cache/src/manager/coalescer.rs`'s
//! `Coalescer::do_request` — the leader/follower split via `DashMap::entry`
//! and a one-shot `broadcast` channel is carried over directly. The loaded
//! value is carried as serialized bytes (`Result<Option<Vec<u8>>>`, already
//! `Clone`) rather than a generic `V`, since `V: Record` is not required to
//! be `Clone` and `broadcast::Sender::send` needs to hand the same value to
//! every follower.

use crate::error::{CacheError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::broadcast;

type Loaded = Result<Option<Vec<u8>>>;

/// Keyed single-flight group. See DESIGN.md's Open Questions for the
/// accepted forget-on-exit race this reproduces from the original.
#[derive(Clone, Default)]
pub struct Coalescer {
    inflight: Arc<DashMap<String, broadcast::Sender<Loaded>>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self { inflight: Arc::new(DashMap::new()) }
    }

    /// Run `f` under single-flight for `key`. The first caller for a cold
    /// key becomes the leader and actually invokes `f`; concurrent callers
    /// for the same key attach as followers and receive a clone of the
    /// leader's result. The group entry is removed as soon as the leader's
    /// future resolves — even if other followers are still attached —
    /// mirroring the original's unconditional `defer sg.Forget(key)`.
    pub async fn do_request<F, Fut>(&self, key: &str, f: F) -> Loaded
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Loaded> + Send + 'static,
    {
        let action = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(o) => Ok(o.get().subscribe()),
            Entry::Vacant(v) => {
                let (tx, _rx) = broadcast::channel(1);
                v.insert(tx.clone());
                Err(tx)
            }
        };

        match action {
            Ok(mut rx) => match rx.recv().await {
                Ok(res) => res,
                Err(_) => Err(CacheError::LoaderError("leader dropped without a result".into())),
            },
            Err(tx) => {
                let result = f().await;
                self.inflight.remove(key);
                if tx.receiver_count() > 0 {
                    let _ = tx.send(result.clone());
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_calls_for_same_key_invoke_loader_once() {
        let coalescer = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let coalescer = coalescer.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coalescer
                    .do_request("k", move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(Some(b"value".to_vec()))
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            let result = h.await.unwrap().unwrap();
            assert_eq!(result, Some(b"value".to_vec()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_a_group() {
        let coalescer = Coalescer::new();
        let a = coalescer.do_request("a", || async { Ok(Some(b"a".to_vec())) }).await;
        let b = coalescer.do_request("b", || async { Ok(Some(b"b".to_vec())) }).await;
        assert_eq!(a.unwrap(), Some(b"a".to_vec()));
        assert_eq!(b.unwrap(), Some(b"b".to_vec()));
    }
}
