//! Shared test infrastructure: Redis connection helpers, unique test keys,
//! and a `Widget` record fixture reused across integration tests.
//!
//! Adapted from `examples/thichuong-multi-tier-cache/tests/common/mod.rs`'s
//! `redis_url`/`test_key`/`wait_for` helpers.

use serde::{Deserialize, Serialize};
use tiercache::error::Result;
use tiercache::record::Record;

/// Get Redis URL from environment or use the default.
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// A unique test key, to avoid collisions across test runs against a
/// shared Redis instance.
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    pub name: String,
    pub zero: bool,
}

impl Widget {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), zero: false }
    }

    pub fn zero_for(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: String::new(), zero: true }
    }
}

impl Record for Widget {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| tiercache::error::CacheError::EncodeFailure(e.to_string()))
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        *self = serde_json::from_slice(bytes)
            .map_err(|e| tiercache::error::CacheError::DecodeFailure(e.to_string()))?;
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.zero
    }
}

/// Poll `condition` until it's true or `timeout_ms` elapses.
pub async fn wait_for<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    use tokio::time::{sleep, Duration};

    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}
