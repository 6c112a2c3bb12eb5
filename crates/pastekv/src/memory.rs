//! In-process backend with the same semantics as the Redis adapter.
//!
//! Expiry uses `tokio::time::Instant`, so tests running on a paused runtime
//! can advance the clock instead of sleeping. Expired entries are dropped
//! when read, and every insert sweeps the whole map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, GetOutcome, InsertOutcome, KvBackend};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Memory-backed [`KvBackend`] for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    closed: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn stored_entries(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, cancel: &CancellationToken) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn conditional_insert(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<InsertOutcome, BackendError> {
        self.check(cancel)?;

        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            return Err(BackendError::Protocol(format!("ttl of {:?} is out of range", ttl)));
        };

        let mut entries = self.lock();
        entries.retain(|_, e| e.expires_at > now);
        if entries.contains_key(key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn get_with_remaining_ttl(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<GetOutcome, BackendError> {
        self.check(cancel)?;

        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(GetOutcome::Found {
                value: entry.value.clone(),
                remaining_ttl: entry.expires_at.saturating_duration_since(now),
            }),
            Some(_) => {
                entries.remove(key);
                Ok(GetOutcome::NotFound)
            }
            None => Ok(GetOutcome::NotFound),
        }
    }

    async fn ping(&self, cancel: &CancellationToken) -> Result<(), BackendError> {
        self.check(cancel)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.lock().clear();
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
