//! Small shared helpers: trace id generation and a thread-safe jitter PRNG.
//!
//! Grounded on `original_source/utils/uuid.go` and `utils/rand.go`. The
//! original's `utils/zcopy.go` zero-copy byte/string views are deliberately
//! not ported: `Record::serialize`/`deserialize` already copy via owned
//! `Vec<u8>`, which is the simpler and safer choice in a language without
//! a borrow-checker-hostile `unsafe.Pointer` escape hatch.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A fresh, dash-free identifier, used as a request trace id.
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Thread-safe PRNG used for TTL jitter. Wrapping a single `StdRng` behind a
/// mutex keeps this cheap enough to call on every Set without reaching for
/// a fresh generator per call.
pub struct SafeRand {
    inner: Mutex<StdRng>,
}

impl SafeRand {
    pub fn new() -> Self {
        Self { inner: Mutex::new(StdRng::from_entropy()) }
    }

    /// Returns a value in `[0, bound)`. Returns 0 if `bound` is 0.
    pub fn gen_range_u64(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.inner.lock().gen_range(0..bound)
    }
}

impl Default for SafeRand {
    fn default() -> Self {
        Self::new()
    }
}
