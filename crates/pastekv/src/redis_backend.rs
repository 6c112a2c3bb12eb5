//! Redis adapter.
//!
//! - Conditional insert is one `SET key value NX PX <ms>` command.
//! - Get-with-TTL is a `MULTI`/`EXEC` of `GET` and `PTTL`, so the value and
//!   its TTL come from the same instant.
//!
//! The pool holds `pool_size` multiplexed connection managers, each opened
//! lazily on first use and reconnected by the redis crate after a drop.
//! Requests pick a slot round robin.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, GetOutcome, InsertOutcome, KvBackend};
use crate::retry::{retry_transient, RetryPolicy};

/// PTTL reply for a key that does not exist.
const PTTL_MISSING: i64 = -2;
/// PTTL reply for a key without an expiry.
const PTTL_PERSISTENT: i64 = -1;

/// Connection settings for [`RedisBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub pool_size: usize,
    pub retry: RetryPolicy,
}

impl RedisConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            pool_size: 32,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Pooled Redis [`KvBackend`].
pub struct RedisBackend {
    client: redis::Client,
    pool: Vec<OnceCell<ConnectionManager>>,
    next: AtomicUsize,
    retry: RetryPolicy,
    closed: AtomicBool,
    address: String,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("address", &self.address)
            .field("pool_size", &self.pool.len())
            .field("retry", &self.retry)
            .finish()
    }
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            BackendError::Connection(err.to_string())
        } else {
            BackendError::Protocol(err.to_string())
        }
    }
}

impl RedisBackend {
    /// Build the adapter. Validates the address but does not connect; the
    /// first command on each pool slot opens its connection.
    pub fn new(config: RedisConfig) -> Result<Self, BackendError> {
        if config.pool_size == 0 {
            return Err(BackendError::Protocol("pool size must be at least 1".into()));
        }

        let address = format!("{}:{}", config.host, config.port);
        let client = redis::Client::open(config.url())
            .map_err(|e| BackendError::Protocol(format!("invalid redis address {}: {}", address, e)))?;

        let pool = (0..config.pool_size).map(|_| OnceCell::new()).collect();

        tracing::info!(%address, pool_size = config.pool_size, "redis backend configured");

        Ok(Self {
            client,
            pool,
            next: AtomicUsize::new(0),
            retry: config.retry,
            closed: AtomicBool::new(false),
            address,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connection(&self) -> Result<ConnectionManager, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }

        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        let manager = self.pool[slot]
            .get_or_try_init(|| async {
                tracing::debug!(address = %self.address, slot, "opening redis connection");
                self.client.get_connection_manager().await
            })
            .await?;
        Ok(manager.clone())
    }
}

/// `PX` argument for a TTL. Redis rejects expiries past `i64::MAX` ms, and
/// a zero `PX` is an error, so sub-millisecond TTLs round up to 1.
fn px_millis(ttl: Duration) -> Result<u64, BackendError> {
    match i64::try_from(ttl.as_millis()) {
        Ok(ms) => Ok(ms.max(1) as u64),
        Err(_) => Err(BackendError::Protocol(format!("ttl of {:?} is out of range", ttl))),
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn conditional_insert(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<InsertOutcome, BackendError> {
        let ttl_ms = px_millis(ttl)?;

        retry_transient(&self.retry, cancel, "set_nx", move || async move {
            let mut conn = self.connection().await?;
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await?;

            Ok(match reply {
                Some(_) => InsertOutcome::Inserted,
                None => InsertOutcome::AlreadyPresent,
            })
        })
        .await
    }

    async fn get_with_remaining_ttl(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<GetOutcome, BackendError> {
        retry_transient(&self.retry, cancel, "get_pttl", move || async move {
            let mut conn = self.connection().await?;
            let (value, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
                .atomic()
                .get(key)
                .pttl(key)
                .query_async(&mut conn)
                .await?;

            Ok(interpret_get(key, value, pttl))
        })
        .await
    }

    async fn ping(&self, cancel: &CancellationToken) -> Result<(), BackendError> {
        retry_transient(&self.retry.with_max_retries(Some(0)), cancel, "ping", move || async move {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!(address = %self.address, "redis backend closed");
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

fn interpret_get(key: &str, value: Option<Vec<u8>>, pttl: i64) -> GetOutcome {
    match (value, pttl) {
        (None, _) | (_, PTTL_MISSING) => GetOutcome::NotFound,
        (Some(value), PTTL_PERSISTENT) => {
            tracing::warn!(key, "record has no expiry; reporting zero remaining ttl");
            GetOutcome::Found {
                value,
                remaining_ttl: Duration::ZERO,
            }
        }
        (Some(value), ms) => GetOutcome::Found {
            value,
            remaining_ttl: Duration::from_millis(u64::try_from(ms).unwrap_or(0)),
        },
    }
}
