//! Error taxonomy shared by every tier and by the chain orchestrator.

use thiserror::Error;

/// Errors produced anywhere in the cache chain.
///
/// Adaptor `get` errors are logged and downgraded to a miss by the chain
/// orchestrator (the walk continues to the next tier); `set`/`del` errors
/// abort the walk and are returned to the caller. See `Chain`/`MultiChain`.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// No tier held the key and the data-source tier reported it doesn't exist.
    #[error("not found")]
    NotFound,

    /// A transient I/O failure talking to a store (connection reset, pool
    /// exhausted, timeout). Safe to retry on a later call.
    #[error("transient io error: {0}")]
    TransientIo(String),

    /// A `Record` failed to serialize itself for a tier write.
    #[error("encode failure: {0}")]
    EncodeFailure(String),

    /// A `Record` failed to decode bytes read back from a tier.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The data-source loader itself returned an error, or panicked.
    #[error("loader error: {0}")]
    LoaderError(String),

    /// The coherence bus could not accept an emit or establish a subscription.
    #[error("bus unavailable: {0}")]
    BusUnavailable(String),

    /// Back-filling a faster tier after a slower-tier hit failed.
    #[error("backfill error: {0}")]
    BackfillError(String),

    /// Anything else; the original's bare `errors.New` sites fall here.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CacheError>;
