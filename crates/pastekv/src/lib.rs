//! Content-addressed, expiring paste storage for Goosebin.
//!
//! Pastes are identified by a [`PasteKey`] derived from their bytes, and
//! stored in a shared key-value backend with an expiry the backend enforces.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pastekv::{PasteEngine, PastePolicy, RedisBackend, RedisConfig, StoreResult};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), pastekv::BackendError> {
//! let backend = RedisBackend::new(RedisConfig::new("localhost", 6379))?;
//! let engine = PasteEngine::new(Arc::new(backend), PastePolicy::default());
//! let cancel = CancellationToken::new();
//!
//! if let StoreResult::Created(key) = engine.store(b"hello world", &cancel).await {
//!     println!("stored at {}", key.path());
//!     let loaded = engine.load(&key.encode(), &cancel).await;
//!     println!("{:?}", loaded);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - [`RedisBackend`]: pooled Redis connections, `SET NX PX` inserts,
//!   transactional `GET` + `PTTL` reads, retry of transient errors.
//! - [`MemoryBackend`]: in-process map for tests and local runs.
//!
//! Identical content always maps to the same key, so a second submission of
//! a live paste is reported as [`StoreResult::AlreadyExists`] and leaves the
//! original expiry alone.

pub mod backend;
pub mod engine;
pub mod key;
pub mod memory;
pub mod redis_backend;
pub mod retry;

pub use backend::{BackendError, GetOutcome, InsertOutcome, KvBackend};
pub use engine::{LoadResult, PasteEngine, PastePolicy, StoreResult};
pub use key::{KeyError, PasteKey, ENCODED_KEY_LEN, PASTE_KEY_LEN, STORE_KEY_PREFIX};
pub use memory::MemoryBackend;
pub use redis_backend::{RedisBackend, RedisConfig};
pub use retry::RetryPolicy;
