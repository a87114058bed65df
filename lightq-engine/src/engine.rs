use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lightq_cache::{CacheError, CacheResult, CacheStore};
use lightq_store::{DurableStore, IndexMemo, StoreError, StoreResult};

use crate::config::EngineConfig;
use crate::worker_pool::WorkerPool;

/// Races `fut` against `timeout`, turning an expiry into
/// [`StoreError::Transient`] so the bounded-retry policy treats a hung call
/// exactly like a dropped connection.
pub(crate) async fn bound_store<T>(timeout: Duration, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Transient(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "durable store call exceeded cache-command-timeout-seconds",
        )))),
    }
}

/// Races `fut` against `timeout` for a cache call, turning an expiry into
/// [`CacheError::Connection`] so [`lightq_cache::CircuitBreakerCache`]
/// counts it the same as any other cache failure.
pub(crate) async fn bound_cache<T>(timeout: Duration, fut: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Connection(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "cache call exceeded cache-command-timeout-seconds",
        )))),
    }
}

/// Wires together the durable store (C1), cache store (C2, already wrapped
/// in a circuit breaker by the caller), and the index-ensurance memo that
/// every other component in this crate shares. One `Engine` serves an
/// entire process; all its methods are safe to call concurrently.
pub struct Engine {
    pub(crate) store: Arc<dyn DurableStore>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) config: EngineConfig,
    pub(crate) index_memo: IndexMemo,
    pub(crate) worker_pool: Option<WorkerPool>,
}

impl Engine {
    /// Builds an engine over `store` and `cache` with `config`. Spins up a
    /// bounded worker pool only when [`crate::config::PersistencePolicy::WriteBehind`]
    /// is configured — write-through never needs one.
    pub fn new(store: Arc<dyn DurableStore>, cache: Arc<dyn CacheStore>, config: EngineConfig) -> Self {
        let worker_pool = match config.persistence_policy {
            crate::config::PersistencePolicy::WriteBehind => Some(WorkerPool::new(config.worker_pool)),
            crate::config::PersistencePolicy::WriteThrough => None,
        };
        let index_memo = IndexMemo::new(config.index_cache_max_groups, config.index_cache_expire());
        Self {
            store,
            cache,
            config,
            index_memo,
            worker_pool,
        }
    }

    /// The engine's effective configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bounds a durable-store call by `cache-command-timeout-seconds`.
    pub(crate) async fn store_call<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        bound_store(self.config.cache_command_timeout(), fut).await
    }

    /// Bounds a cache call by `cache-command-timeout-seconds`.
    pub(crate) async fn cache_call<T>(&self, fut: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        bound_cache(self.config.cache_command_timeout(), fut).await
    }

    pub(crate) async fn ensure_indexes(&self, group: &lightq_core::ConsumerGroup) -> lightq_store::StoreResult<()> {
        if self.index_memo.needs_ensure(group.as_str()) {
            self.store_call(self.store.ensure_indexes(group)).await?;
            if self.config.dlq_ttl_minutes > 0 {
                self.store_call(self.store.ensure_dlq_index(group)).await?;
            }
        }
        Ok(())
    }

    /// Drains the cache backend with a bounded wait, for use during
    /// graceful process shutdown. A backend that doesn't finish in time is
    /// abandoned rather than blocking shutdown indefinitely.
    pub async fn shutdown(&self) {
        if tokio::time::timeout(self.config.cache_shutdown_timeout(), self.cache.shutdown()).await.is_err() {
            tracing::warn!("cache shutdown exceeded cache-shutdown-timeout-seconds; abandoning");
        }
    }
}
