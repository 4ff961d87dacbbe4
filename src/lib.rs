//! tiercache
//!
//! A tiered read-through cache library. Callers register an ordered chain
//! of adaptors — typically `{process-local memory, remote shared store,
//! authoritative data source}` — and issue single-key or multi-key
//! lookups. The chain walks fastest to slowest, promotes found values back
//! toward the fastest tier, and guarantees that concurrent identical
//! lookups do not multiply underlying work.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiercache::chain::Chain;
//! use tiercache::datasource::{DataSourceOptions, DataSourceTier, LoaderFn};
//! use tiercache::local::{LocalOptions, LocalTier, MokaByteStore};
//! use tiercache::record::Record;
//! use tiercache::telemetry::TelemetryLogger;
//! use tiercache::error::Result;
//!
//! #[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
//! struct User { id: String, name: String, zero: bool }
//!
//! impl Record for User {
//!     fn key(&self) -> String { self.id.clone() }
//!     fn serialize(&self) -> Result<Vec<u8>> {
//!         Ok(serde_json::to_vec(self).unwrap())
//!     }
//!     fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
//!         *self = serde_json::from_slice(bytes).unwrap();
//!         Ok(())
//!     }
//!     fn is_zero(&self) -> bool { self.zero }
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let local = Arc::new(LocalTier::new(LocalOptions::default(), Arc::new(MokaByteStore::default())));
//! let loader: LoaderFn<String, User> = Arc::new(|id: String| Box::pin(async move {
//!     Ok(Some(User { id, name: "alice".into(), zero: false }))
//! }));
//! let source = Arc::new(DataSourceTier::new(DataSourceOptions::default(), loader));
//!
//! let chain: Chain<String, User> = Chain::new("users", Arc::new(TelemetryLogger::new()))
//!     .with_tier(local)
//!     .with_tier(source);
//!
//! let mut dst = User::default();
//! let found = chain.get(&"alice".to_string(), &mut dst).await?;
//! # let _ = found;
//! # Ok(())
//! # }
//! ```

pub mod adaptor;
pub mod chain;
pub mod datasource;
pub mod error;
pub mod local;
pub mod record;
pub mod remote;
pub mod syncer;
pub mod telemetry;
pub mod utils;

pub use adaptor::{Adaptor, MultiAdaptor};
pub use chain::{Chain, MultiChain};
pub use error::{CacheError, Result};
pub use record::Record;

pub use async_trait::async_trait;
