//! PasteEngine: content-addressed store/load on top of a [`KvBackend`].
//!
//! The engine keeps no state besides its policy and the injected backend
//! handle. Races between identical submissions are settled by the backend's
//! conditional insert; the engine takes no locks.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, GetOutcome, InsertOutcome, KvBackend};
use crate::key::PasteKey;

/// Lifetime and size limits applied to new pastes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PastePolicy {
    pub ttl: Duration,
    /// Largest accepted paste, in bytes.
    pub size_limit: usize,
}

impl Default for PastePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
            size_limit: 65535,
        }
    }
}

/// Outcome of [`PasteEngine::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResult {
    /// This call wrote the record.
    Created(PasteKey),
    /// A live record for identical content already existed. Its expiry was
    /// not extended.
    AlreadyExists(PasteKey),
    /// The content exceeded the size limit; the backend was not contacted.
    TooLarge { limit: usize },
    BackendFailure(BackendError),
}

/// Outcome of [`PasteEngine::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Found {
        content: Vec<u8>,
        remaining_ttl: Duration,
    },
    /// Covers both malformed key text and a well-formed key with no live
    /// record, so callers cannot probe which keys are valid.
    NotFoundOrInvalidKey,
    BackendFailure(BackendError),
}

/// Paste identity and lifecycle engine.
#[derive(Clone)]
pub struct PasteEngine {
    backend: Arc<dyn KvBackend>,
    policy: PastePolicy,
}

impl std::fmt::Debug for PasteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteEngine")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl PasteEngine {
    pub fn new(backend: Arc<dyn KvBackend>, policy: PastePolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &PastePolicy {
        &self.policy
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    /// Store content under its derived key using the engine's policy.
    pub async fn store(&self, content: &[u8], cancel: &CancellationToken) -> StoreResult {
        self.store_with(content, self.policy, cancel).await
    }

    /// Store content with an explicit TTL and size limit.
    #[tracing::instrument(name = "paste.store", skip_all, fields(size = content.len()))]
    pub async fn store_with(
        &self,
        content: &[u8],
        policy: PastePolicy,
        cancel: &CancellationToken,
    ) -> StoreResult {
        // Checked before hashing so oversized input costs nothing.
        if content.len() > policy.size_limit {
            tracing::debug!(limit = policy.size_limit, "paste too large");
            return StoreResult::TooLarge {
                limit: policy.size_limit,
            };
        }

        let key = PasteKey::derive(content);
        let outcome = self
            .backend
            .conditional_insert(&key.store_key(), content, policy.ttl, cancel)
            .await;

        match outcome {
            Ok(InsertOutcome::Inserted) => {
                tracing::info!(%key, ttl_secs = policy.ttl.as_secs(), "paste created");
                StoreResult::Created(key)
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                tracing::debug!(%key, "paste already exists");
                StoreResult::AlreadyExists(key)
            }
            Err(e) => {
                tracing::error!(%key, error = %e, "failed to store paste");
                StoreResult::BackendFailure(e)
            }
        }
    }

    /// Load a paste by the textual key from a request path.
    #[tracing::instrument(name = "paste.load", skip_all)]
    pub async fn load(&self, text: &str, cancel: &CancellationToken) -> LoadResult {
        let key = match PasteKey::decode(text) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting malformed paste key");
                return LoadResult::NotFoundOrInvalidKey;
            }
        };

        match self.backend.get_with_remaining_ttl(&key.store_key(), cancel).await {
            Ok(GetOutcome::Found {
                value,
                remaining_ttl,
            }) => LoadResult::Found {
                content: value,
                remaining_ttl,
            },
            Ok(GetOutcome::NotFound) => {
                tracing::debug!(%key, "paste not found");
                LoadResult::NotFoundOrInvalidKey
            }
            Err(e) => {
                tracing::error!(%key, error = %e, "failed to load paste");
                LoadResult::BackendFailure(e)
            }
        }
    }

    /// Check that the backend answers.
    pub async fn check_backend(&self, cancel: &CancellationToken) -> Result<(), BackendError> {
        self.backend.ping(cancel).await
    }

    /// Close the backend. Later store/load calls report `BackendFailure`.
    pub async fn shutdown(&self) {
        self.backend.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that fails every call with the given error and counts calls.
    struct FailingBackend {
        error: BackendError,
        calls: AtomicUsize,
    }

    impl FailingBackend {
        fn new(error: BackendError) -> Self {
            Self {
                error,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KvBackend for FailingBackend {
        async fn conditional_insert(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: Duration,
            _cancel: &CancellationToken,
        ) -> Result<InsertOutcome, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }

        async fn get_with_remaining_ttl(
            &self,
            _key: &str,
            _cancel: &CancellationToken,
        ) -> Result<GetOutcome, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }

        async fn ping(&self, _cancel: &CancellationToken) -> Result<(), BackendError> {
            Err(self.error.clone())
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn memory_engine(policy: PastePolicy) -> PasteEngine {
        PasteEngine::new(Arc::new(MemoryBackend::new()), policy)
    }

    fn policy(ttl_secs: u64, size_limit: usize) -> PastePolicy {
        PastePolicy {
            ttl: Duration::from_secs(ttl_secs),
            size_limit,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_scenario() {
        let engine = memory_engine(policy(3600, 65535));
        let cancel = CancellationToken::new();

        let key = match engine.store(b"hello world", &cancel).await {
            StoreResult::Created(key) => key,
            other => panic!("expected Created, got {other:?}"),
        };

        assert_eq!(
            engine.load(&key.encode(), &cancel).await,
            LoadResult::Found {
                content: b"hello world".to_vec(),
                remaining_ttl: Duration::from_secs(3600),
            }
        );

        assert_eq!(
            engine.store(b"hello world", &cancel).await,
            StoreResult::AlreadyExists(key)
        );

        assert_eq!(
            engine.load("not-a-valid-encoding!!", &cancel).await,
            LoadResult::NotFoundOrInvalidKey
        );
    }

    #[tokio::test]
    async fn test_size_boundary() {
        let engine = memory_engine(policy(60, 128));
        let cancel = CancellationToken::new();

        let exact = vec![b'a'; 128];
        assert!(matches!(
            engine.store(&exact, &cancel).await,
            StoreResult::Created(_)
        ));

        let over = vec![b'a'; 129];
        assert_eq!(
            engine.store(&over, &cancel).await,
            StoreResult::TooLarge { limit: 128 }
        );
    }

    #[tokio::test]
    async fn test_too_large_never_touches_backend() {
        let backend = Arc::new(FailingBackend::new(BackendError::Connection("down".into())));
        let engine = PasteEngine::new(backend.clone(), policy(60, 128));
        let cancel = CancellationToken::new();

        let result = engine.store(&[0u8; 129], &cancel).await;
        assert_eq!(result, StoreResult::TooLarge { limit: 128 });
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_with_overrides_policy() {
        let engine = memory_engine(policy(60, 128));
        let cancel = CancellationToken::new();

        let big = vec![b'x'; 1000];
        let result = engine.store_with(&big, policy(60, 4096), &cancel).await;
        assert!(matches!(result, StoreResult::Created(_)));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_on_store() {
        let backend = Arc::new(FailingBackend::new(BackendError::Timeout));
        let engine = PasteEngine::new(backend, PastePolicy::default());
        let cancel = CancellationToken::new();

        assert_eq!(
            engine.store(b"data", &cancel).await,
            StoreResult::BackendFailure(BackendError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_on_load() {
        let backend = Arc::new(FailingBackend::new(BackendError::Protocol("boom".into())));
        let engine = PasteEngine::new(backend.clone(), PastePolicy::default());
        let cancel = CancellationToken::new();

        let key = PasteKey::derive(b"data");
        assert_eq!(
            engine.load(&key.encode(), &cancel).await,
            LoadResult::BackendFailure(BackendError::Protocol("boom".into()))
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_skips_backend() {
        let backend = Arc::new(FailingBackend::new(BackendError::Timeout));
        let engine = PasteEngine::new(backend.clone(), PastePolicy::default());
        let cancel = CancellationToken::new();

        assert_eq!(engine.load("%%%", &cancel).await, LoadResult::NotFoundOrInvalidKey);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_but_absent_key_is_not_found() {
        let engine = memory_engine(PastePolicy::default());
        let cancel = CancellationToken::new();
        let key = PasteKey::derive(b"never stored");

        assert_eq!(
            engine.load(&key.encode(), &cancel).await,
            LoadResult::NotFoundOrInvalidKey
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_decays_then_expires() {
        let engine = memory_engine(policy(100, 1024));
        let cancel = CancellationToken::new();

        let key = match engine.store(b"ephemeral", &cancel).await {
            StoreResult::Created(key) => key,
            other => panic!("expected Created, got {other:?}"),
        };

        let first = match engine.load(&key.encode(), &cancel).await {
            LoadResult::Found { remaining_ttl, .. } => remaining_ttl,
            other => panic!("expected Found, got {other:?}"),
        };
        assert!(first <= Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(40)).await;
        let second = match engine.load(&key.encode(), &cancel).await {
            LoadResult::Found { remaining_ttl, .. } => remaining_ttl,
            other => panic!("expected Found, got {other:?}"),
        };
        assert!(second < first);
        assert_eq!(second, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(
            engine.load(&key.encode(), &cancel).await,
            LoadResult::NotFoundOrInvalidKey
        );

        // Expired content can be created again.
        assert_eq!(
            engine.store(b"ephemeral", &cancel).await,
            StoreResult::Created(key)
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_backend() {
        let engine = memory_engine(PastePolicy::default());
        let cancel = CancellationToken::new();
        engine.shutdown().await;

        assert_eq!(
            engine.store(b"late", &cancel).await,
            StoreResult::BackendFailure(BackendError::Closed)
        );
        assert_eq!(engine.check_backend(&cancel).await, Err(BackendError::Closed));
    }
}
