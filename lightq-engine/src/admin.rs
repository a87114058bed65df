//! Admin view (component C8): consumption-filtered inspection merging the
//! cache and durable store without duplicates.

use std::collections::HashSet;

use lightq_core::{ConsumerGroup, LightQError, Message};
use lightq_store::{Filter, Sort};

use crate::engine::Engine;

/// The `consumed` query filter accepted by [`Engine::view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumedFilter {
    /// Only terminal (`consumed = true`) messages.
    Yes,
    /// Only unconsumed messages.
    No,
    /// No filter.
    Any,
}

impl Engine {
    /// Returns up to `limit` messages from `group`, ordered by `createdAt
    /// asc`, matching `filter`.
    ///
    /// `Yes` reads the durable store directly. Otherwise this is
    /// cache-first: up to `limit` cached entries are read, de-duplicated
    /// against a durable query that excludes the cached ids, concatenated,
    /// sorted, and truncated. Any cached id the durable store reports
    /// consumed is a stale cache entry and is evicted (self-healing) and
    /// excluded from the result.
    pub async fn view(&self, group: &str, limit: usize, filter: ConsumedFilter) -> Result<Vec<Message>, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let limit = limit.min(self.config.message_allowed_to_fetch).max(1);

        if filter == ConsumedFilter::Yes {
            return self
                .store_call(self.store.find(&group, Filter::Consumed(true), Some(Sort::CreatedAtAsc), Some(limit)))
                .await
                .map_err(|e| LightQError::Internal(format!("admin view failed: {e}")));
        }

        let cached = self.cache_call(self.cache.peek(&group, limit)).await.unwrap_or_default();
        let cached_ids: HashSet<_> = cached.iter().map(|m| m.id).collect();

        let mut live = Vec::with_capacity(cached.len());
        for candidate in cached {
            match self.store_call(self.store.find_by_id(&group, candidate.id)).await {
                Ok(Some(found)) if found.consumed => {
                    if let Err(e) = self.cache_call(self.cache.remove_one(&group, candidate.id)).await {
                        tracing::warn!(group = group.as_str(), error = %e, "self-heal eviction failed during admin view");
                    } else {
                        #[cfg(feature = "metrics")]
                        crate::metrics::record_self_heal_eviction(group.as_str());
                    }
                }
                Ok(Some(found)) => live.push(found),
                Ok(None) => {
                    if let Err(e) = self.cache_call(self.cache.remove_one(&group, candidate.id)).await {
                        tracing::warn!(group = group.as_str(), error = %e, "self-heal eviction failed during admin view");
                    }
                }
                Err(e) => tracing::warn!(group = group.as_str(), error = %e, "durable lookup failed during admin view"),
            }
        }

        let durable_filter = if filter == ConsumedFilter::No {
            Filter::Consumed(false)
        } else {
            Filter::Any
        };
        let mut rest = self
            .store_call(self.store.find(&group, durable_filter, Some(Sort::CreatedAtAsc), Some(limit)))
            .await
            .map_err(|e| LightQError::Internal(format!("admin view failed: {e}")))?;
        rest.retain(|m| !cached_ids.contains(&m.id));

        live.extend(rest);
        live.sort_by_key(|m| m.created_at);
        live.truncate(limit);
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use lightq_cache_memory::MemoryCache;
    use lightq_store_memory::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new(Duration::from_secs(300), 1000)),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn view_merges_cache_and_durable_without_duplicates() {
        let engine = engine();
        engine.push("g", b"a".to_vec(), None).await.unwrap();
        engine.push("g", b"b".to_vec(), None).await.unwrap();

        let msgs = engine.view("g", 10, ConsumedFilter::No).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, b"a");
        assert_eq!(msgs[1].content, b"b");
    }

    #[tokio::test]
    async fn view_yes_filter_reads_consumed_only() {
        let engine = engine();
        let msg = engine.push("g", b"a".to_vec(), None).await.unwrap();
        engine.push("g", b"b".to_vec(), None).await.unwrap();
        engine.pop("g").await.unwrap();
        engine.ack("g", msg.id).await.unwrap();

        let msgs = engine.view("g", 10, ConsumedFilter::Yes).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, msg.id);
    }

    #[tokio::test]
    async fn view_self_heals_stale_cache_entry() {
        let engine = engine();
        let msg = engine.push("g", b"a".to_vec(), None).await.unwrap();
        engine
            .store
            .update_if(
                &msg.consumer_group,
                lightq_store::Filter::ById(msg.id),
                lightq_store::Update::Ack { now: chrono::Utc::now() },
            )
            .await
            .unwrap();

        let msgs = engine.view("g", 10, ConsumedFilter::No).await.unwrap();
        assert!(msgs.is_empty());
        assert!(engine.cache.peek(&msg.consumer_group, 10).await.unwrap().is_empty());
    }
}
