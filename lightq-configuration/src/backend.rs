use std::sync::Arc;
use std::time::Duration;

use lightq_cache::{CacheStore, CircuitBreakerCache};
use lightq_cache_memory::MemoryCache;
use lightq_cache_redis::RedisCache;
use lightq_store::DurableStore;
use lightq_store_memory::MemoryStore;
use lightq_store_mongo::MongoStore;

use crate::error::ConfigError;
use crate::settings::{CacheStoreSettings, DurableStoreSettings, Settings};

/// Connects the durable-store backend selected by `settings.durable-store`.
pub async fn build_durable_store(settings: &Settings) -> Result<Arc<dyn DurableStore>, ConfigError> {
    match &settings.durable_store {
        DurableStoreSettings::Mongo { uri, database } => {
            let dlq_ttl_minutes = (settings.dlq_ttl_minutes > 0).then_some(settings.dlq_ttl_minutes as u64);
            let store = MongoStore::connect(
                uri,
                database,
                settings.dlq_suffix.clone(),
                settings.persistence_duration_minutes.max(0) as u64,
                dlq_ttl_minutes,
            )
            .await
            .map_err(|e| ConfigError::DurableStore(Box::new(e)))?;
            Ok(Arc::new(store))
        }
        DurableStoreSettings::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Builds the cache-store backend selected by `settings.cache-store`,
/// wrapped in the default-tuned [`CircuitBreakerCache`] so a cache outage
/// never surfaces to the engine as an error.
pub fn build_cache_store(settings: &Settings) -> Result<Arc<dyn CacheStore>, ConfigError> {
    let ttl = Duration::from_secs((settings.cache_ttl_minutes.max(0) as u64) * 60);
    match &settings.cache_store {
        CacheStoreSettings::Redis { server } => {
            let redis = RedisCache::builder()
                .server(server.clone())
                .ttl(ttl)
                .max_entries_per_group(settings.cache_max_entries_per_group)
                .build()
                .map_err(|e| ConfigError::CacheStore(Box::new(e)))?;
            Ok(Arc::new(CircuitBreakerCache::with_defaults(redis)))
        }
        CacheStoreSettings::Memory => {
            let memory = MemoryCache::new(ttl, settings.cache_max_entries_per_group);
            Ok(Arc::new(CircuitBreakerCache::with_defaults(memory)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_durable_store_builds_without_io() {
        let settings = Settings::default();
        let store = build_durable_store(&settings).await.unwrap();
        let group = lightq_core::ConsumerGroup::parse("g").unwrap();
        assert!(store.find_by_id(&group, lightq_core::MessageId::new()).await.unwrap().is_none());
    }

    #[test]
    fn memory_cache_store_builds_without_io() {
        let settings = Settings::default();
        assert!(build_cache_store(&settings).is_ok());
    }
}
