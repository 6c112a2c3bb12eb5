//! Builds the paste engine from resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use gooseconf::GooseConfig;
use pastekv::{KvBackend, MemoryBackend, PasteEngine, PastePolicy, RedisBackend, RedisConfig, RetryPolicy};

/// Which key-value store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendKind {
    /// Shared Redis server from `[backend]`
    #[default]
    Redis,
    /// Process-local map; pastes vanish on restart
    Memory,
}

pub fn paste_policy(config: &GooseConfig) -> PastePolicy {
    PastePolicy {
        ttl: config.paste.ttl(),
        size_limit: config.paste.size_limit,
    }
}

pub fn retry_policy(config: &GooseConfig) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(config.backend.retry_limit())
        .with_command_timeout(config.backend.command_timeout())
}

/// Construct the backend. Redis connections open lazily, so this does not
/// touch the network.
pub fn build_backend(config: &GooseConfig, kind: BackendKind) -> Result<Arc<dyn KvBackend>> {
    match kind {
        BackendKind::Redis => {
            let redis_config = RedisConfig::new(config.backend.host.clone(), config.backend.port)
                .with_pool_size(config.backend.pool_size)
                .with_retry(retry_policy(config));
            let backend = RedisBackend::new(redis_config)
                .with_context(|| format!("Failed to configure redis backend at {}", config.backend.address()))?;
            Ok(Arc::new(backend))
        }
        BackendKind::Memory => {
            tracing::warn!("Using in-memory backend; pastes will not survive a restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

pub fn build_engine(config: &GooseConfig, kind: BackendKind) -> Result<PasteEngine> {
    let backend = build_backend(config, kind)?;
    Ok(PasteEngine::new(backend, paste_policy(config)))
}
