//! Coherence bus: publish/subscribe of local-tier Add/Delete events across
//! processes, with self-loop suppression by originator id.
//!
//! Grounded on `examples/thichuong-multi-tier-cache/src/invalidation.rs`
//! (`InvalidationPublisher`/`InvalidationSubscriber` over Redis Pub/Sub —
//! the reconnect-with-backoff subscriber loop is carried over almost
//! verbatim) and `original_source/syncer/event.go` + `syncer/redissyncer.go`,
//! whose two-variant wire event and self-loop-suppression-by-`clientId`
//! are both added here.

use crate::error::{CacheError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// What happened to a key on the originator's local tier. Encoded on the
/// wire as the integers the original Go enum uses (`1=Add, 2=Delete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    Add = 1,
    Delete = 2,
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(EventType::Add),
            2 => Ok(EventType::Delete),
            other => Err(serde::de::Error::custom(format!("unknown eventType {other}"))),
        }
    }
}

/// Wire format for a coherence event. Field names match
/// `original_source/syncer/event.go`'s JSON tags exactly
/// (`clientId`/`eventType`/`key`/`val`/`ttl`) so a Rust subscriber and a
/// hypothetical non-Rust publisher on the same bus agree on the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSyncEvent {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    pub key: String,
    /// Base64-encoded value bytes, present on Add events — matches
    /// `original_source/syncer/event.go`'s JSON-over-base64 wire encoding.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub val: Option<String>,
    /// TTL in whole seconds, present on Add events.
    pub ttl: Option<u64>,
}

impl CacheSyncEvent {
    pub fn add(client_id: impl Into<String>, key: impl Into<String>, val: &[u8], ttl: Duration) -> Self {
        use base64::Engine;
        Self {
            client_id: client_id.into(),
            event_type: EventType::Add,
            key: key.into(),
            val: Some(base64::engine::general_purpose::STANDARD.encode(val)),
            ttl: Some(ttl.as_secs()),
        }
    }

    /// Decode the base64 `val` field, if present.
    pub fn value_bytes(&self) -> Result<Option<Vec<u8>>> {
        use base64::Engine;
        self.val
            .as_deref()
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(|e| CacheError::DecodeFailure(e.to_string()))
            })
            .transpose()
    }

    pub fn delete(client_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            event_type: EventType::Delete,
            key: key.into(),
            val: None,
            ttl: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CacheError::EncodeFailure(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| CacheError::DecodeFailure(e.to_string()))
    }
}

/// Handler invoked per non-self event. Errors are logged by the subscriber
/// loop, never propagated to the publisher.
pub type EventHandler = Arc<dyn Fn(CacheSyncEvent) -> futures_util::future::BoxFuture<'static, Result<()>> + Send + Sync>;

/// Publish/subscribe contract for the coherence bus. `client_id` is a
/// stable per-instance identifier generated once at construction and
/// stamped onto every emitted event so subscribers can drop their own.
#[async_trait]
pub trait Syncer: Send + Sync {
    fn client_id(&self) -> &str;
    async fn emit(&self, event: CacheSyncEvent) -> Result<()>;
    fn subscribe(&self, handler: EventHandler);
}

#[derive(Debug, Default, Clone)]
pub struct SyncerStats {
    pub emitted: u64,
    pub received: u64,
    pub self_suppressed: u64,
    pub processing_errors: u64,
}

#[derive(Default)]
struct AtomicSyncerStats {
    emitted: AtomicU64,
    received: AtomicU64,
    self_suppressed: AtomicU64,
    processing_errors: AtomicU64,
}

impl AtomicSyncerStats {
    fn snapshot(&self) -> SyncerStats {
        SyncerStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            self_suppressed: self.self_suppressed.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
        }
    }
}

/// Redis Pub/Sub backed [`Syncer`].
pub struct RedisSyncer {
    client_id: String,
    channel: String,
    client: redis::Client,
    conn: tokio::sync::Mutex<redis::aio::ConnectionManager>,
    stats: Arc<AtomicSyncerStats>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RedisSyncer {
    pub async fn new(redis_url: &str, channel: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::BusUnavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BusUnavailable(e.to_string()))?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            client_id: crate::utils::new_trace_id(),
            channel: channel.into(),
            client,
            conn: tokio::sync::Mutex::new(conn),
            stats: Arc::new(AtomicSyncerStats::default()),
            shutdown_tx,
        })
    }

    pub fn stats(&self) -> SyncerStats {
        self.stats.snapshot()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn run_subscriber_loop(
        client: &redis::Client,
        channel: &str,
        client_id: &str,
        handler: EventHandler,
        stats: Arc<AtomicSyncerStats>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| CacheError::BusUnavailable(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| CacheError::BusUnavailable(e.to_string()))?;
        tracing::info!(channel, "coherence bus subscribed");

        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Err(CacheError::BusUnavailable("pubsub stream ended".into()));
                    };
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "coherence event payload unreadable");
                            stats.processing_errors.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };
                    let event = match CacheSyncEvent::from_json(&payload) {
                        Ok(e) => e,
                        Err(e) => {
                            tracing::warn!(error = %e, "malformed coherence event, dropping");
                            stats.processing_errors.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };
                    if event.client_id == client_id {
                        stats.self_suppressed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    stats.received.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = handler(event).await {
                        tracing::error!(error = %e, "coherence event handler failed");
                        stats.processing_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ = shutdown_rx.recv() => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl Syncer for RedisSyncer {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn emit(&self, mut event: CacheSyncEvent) -> Result<()> {
        event.client_id = self.client_id.clone();
        let json = event.to_json()?;
        let mut conn = self.conn.lock().await;
        let _: () = redis::AsyncCommands::publish(&mut *conn, &self.channel, json)
            .await
            .map_err(|e| CacheError::BusUnavailable(e.to_string()))?;
        self.stats.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn subscribe(&self, handler: EventHandler) {
        let client = self.client.clone();
        let channel = self.channel.clone();
        let client_id = self.client_id.clone();
        let stats = Arc::clone(&self.stats);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    return;
                }
                match Self::run_subscriber_loop(
                    &client,
                    &channel,
                    &client_id,
                    Arc::clone(&handler),
                    Arc::clone(&stats),
                    &mut shutdown_rx,
                )
                .await
                {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::error!(error = %e, "coherence bus subscriber error, retrying in 5s");
                        stats.processing_errors.fetch_add(1, Ordering::Relaxed);
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(5)) => {},
                            _ = shutdown_rx.recv() => return,
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_field_names_match_original() {
        let event = CacheSyncEvent::add("client-a", "k1", b"hello", Duration::from_secs(30));
        let json = event.to_json().unwrap();
        assert!(json.contains("\"clientId\":\"client-a\""));
        assert!(json.contains("\"eventType\":1"));
        assert!(json.contains("\"key\":\"k1\""));
        assert!(json.contains("\"ttl\":30"));
    }

    #[test]
    fn round_trips_through_json() {
        let event = CacheSyncEvent::delete("client-b", "k2");
        let json = event.to_json().unwrap();
        let back = CacheSyncEvent::from_json(&json).unwrap();
        assert_eq!(back.client_id, "client-b");
        assert_eq!(back.event_type, EventType::Delete);
        assert_eq!(back.key, "k2");
        assert!(back.val.is_none());
    }

    #[test]
    fn value_bytes_round_trip_base64() {
        let event = CacheSyncEvent::add("client-a", "k1", b"hello", Duration::from_secs(30));
        assert_eq!(event.value_bytes().unwrap(), Some(b"hello".to_vec()));
    }
}
