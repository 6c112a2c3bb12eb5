//! The key-value contract the paste engine is written against.
//!
//! A backend needs exactly two data primitives: an atomic
//! set-if-absent-with-expiry and a get that also reports the remaining TTL.
//! Connection pooling and retry live behind this trait; callers only see the
//! outcome enums and [`BackendError`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was absent and now holds the value.
    Inserted,
    /// The key already held a value; nothing was written.
    AlreadyPresent,
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Found {
        value: Vec<u8>,
        /// Time left before the backend expires the record. Never larger than
        /// the TTL the record was written with.
        remaining_ttl: Duration,
    },
    NotFound,
}

/// Backend failures. These are never folded into a "not found" or
/// "already exists" answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend operation cancelled")]
    Cancelled,

    #[error("backend operation timed out")]
    Timeout,

    #[error("backend connection error: {0}")]
    Connection(String),

    #[error("backend protocol error: {0}")]
    Protocol(String),

    #[error("backend is closed")]
    Closed,
}

impl BackendError {
    /// Whether a retry of the same idempotent command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Timeout | BackendError::Connection(_))
    }
}

/// Trait for paste storage backends.
///
/// Implementations must make `conditional_insert` atomic: under concurrent
/// calls for the same key exactly one caller observes
/// [`InsertOutcome::Inserted`].
///
/// Every call takes the caller's cancellation token. When it fires the call
/// returns [`BackendError::Cancelled`] instead of waiting on the network.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Store `value` under `key` with the given TTL, only if `key` is absent.
    ///
    /// An existing record is left untouched, including its expiry.
    async fn conditional_insert(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<InsertOutcome, BackendError>;

    /// Read a value together with its remaining TTL.
    async fn get_with_remaining_ttl(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<GetOutcome, BackendError>;

    /// Round-trip check used by health probes.
    async fn ping(&self, cancel: &CancellationToken) -> Result<(), BackendError>;

    /// Release connections. Calls made after `close` fail with
    /// [`BackendError::Closed`].
    async fn close(&self) {}

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}
