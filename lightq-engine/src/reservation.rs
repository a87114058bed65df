//! Reservation engine (component C4): cache-peek plus atomic durable
//! reserve, self-healing of stale cache entries, and DLQ triage on
//! over-delivery.

use chrono::Utc;
use lightq_core::{ConsumerGroup, LightQError, Message};
use lightq_store::{Filter, Sort, Update};

use crate::engine::Engine;

const DLQ_REASON_MAX_DELIVERIES: &str = "max-deliveries";

impl Engine {
    /// Hands out one reservable message from `group`, exclusively for
    /// `visibility-timeout-seconds`. Returns `Ok(None)` if nothing is
    /// currently reservable.
    pub async fn pop(&self, group: &str) -> Result<Option<Message>, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let peek_limit = self.config.message_allowed_to_fetch.min(10);
        let candidates = self
            .cache_call(self.cache.peek(&group, peek_limit))
            .await
            .unwrap_or_else(|_| Vec::new());

        for candidate in candidates {
            let now = Utc::now();
            let reserved = self
                .store_call(self.store.find_and_modify(
                    &group,
                    Filter::ByIdReservable { id: candidate.id, now },
                    Update::Reserve {
                        now,
                        visibility_timeout: self.config.visibility_timeout(),
                    },
                    None,
                    true,
                ))
                .await
                .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;

            match reserved {
                Some(msg) if msg.delivery_count > self.config.max_delivery_attempts => {
                    self.move_to_dlq(&msg, &group, DLQ_REASON_MAX_DELIVERIES).await?;
                    continue;
                }
                Some(msg) => {
                    if let Err(e) = self.cache_call(self.cache.remove_one(&group, msg.id)).await {
                        tracing::warn!(group = group.as_str(), error = %e, "cache remove_one failed after reserve");
                    }
                    return Ok(Some(msg));
                }
                None => {
                    self.reconcile(&candidate, &group).await;
                }
            }
        }

        loop {
            let now = Utc::now();
            let reserved = self
                .store_call(self.store.find_and_modify(
                    &group,
                    Filter::Reservable { now },
                    Update::Reserve {
                        now,
                        visibility_timeout: self.config.visibility_timeout(),
                    },
                    Some(Sort::CreatedAtAsc),
                    true,
                ))
                .await
                .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;

            match reserved {
                Some(msg) if msg.delivery_count > self.config.max_delivery_attempts => {
                    self.move_to_dlq(&msg, &group, DLQ_REASON_MAX_DELIVERIES).await?;
                    continue;
                }
                Some(msg) => return Ok(Some(msg)),
                None => {
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_pop_empty(group.as_str());
                    return Ok(None);
                }
            }
        }
    }

    /// A cache entry failed to reserve-by-id; check whether the durable
    /// store has disowned it (missing or already consumed) and, if so,
    /// evict it from the cache. Otherwise it is likely held by another
    /// consumer or not yet due — leave it in place.
    async fn reconcile(&self, candidate: &Message, group: &ConsumerGroup) {
        let found = match self.store_call(self.store.find_by_id(group, candidate.id)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(group = group.as_str(), error = %e, "reconcile lookup failed");
                return;
            }
        };
        let disowned = match found {
            None => true,
            Some(msg) => msg.consumed,
        };
        if disowned {
            if let Err(e) = self.cache_call(self.cache.remove_one(group, candidate.id)).await {
                tracing::warn!(group = group.as_str(), error = %e, "self-heal eviction failed");
            } else {
                #[cfg(feature = "metrics")]
                crate::metrics::record_self_heal_eviction(group.as_str());
            }
        }
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

    fn engine_with(config: EngineConfig) -> Engine {
        Engine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new(Duration::from_secs(300), 1000)),
            config,
        )
    }

    #[tokio::test]
    async fn fifo_baseline_single_producer_single_consumer() {
        let engine = engine_with(EngineConfig::default());
        engine.push("g", b"A".to_vec(), None).await.unwrap();
        engine.push("g", b"B".to_vec(), None).await.unwrap();
        engine.push("g", b"C".to_vec(), None).await.unwrap();

        let a = engine.pop("g").await.unwrap().unwrap();
        engine.ack("g", a.id).await.unwrap();
        let b = engine.pop("g").await.unwrap().unwrap();
        engine.ack("g", b.id).await.unwrap();
        let c = engine.pop("g").await.unwrap().unwrap();
        engine.ack("g", c.id).await.unwrap();

        assert_eq!(a.content, b"A");
        assert_eq!(b.content, b"B");
        assert_eq!(c.content, b"C");
        assert!(engine.pop("g").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mutual_exclusion_second_reserve_fails_during_visibility_window() {
        let engine = engine_with(EngineConfig {
            visibility_timeout_seconds: 60,
            ..EngineConfig::default()
        });
        engine.push("g", b"X".to_vec(), None).await.unwrap();
        let first = engine.pop("g").await.unwrap().unwrap();
        assert_eq!(first.delivery_count, 1);
        assert!(engine.pop("g").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn over_delivery_triggers_dlq_and_is_not_returned_again() {
        let engine = engine_with(EngineConfig {
            visibility_timeout_seconds: 0,
            max_delivery_attempts: 2,
            ..EngineConfig::default()
        });
        engine.push("g", b"Z".to_vec(), None).await.unwrap();

        // Two deliveries are within budget; nack to make it reservable again each time.
        let first = engine.pop("g").await.unwrap().unwrap();
        engine.nack("g", first.id, Some("r".into())).await.unwrap();
        let second = engine.pop("g").await.unwrap().unwrap();
        assert_eq!(second.delivery_count, 2);
        engine.nack("g", second.id, Some("r".into())).await.unwrap();

        // Third reservation exceeds the cap and is diverted to the DLQ.
        assert!(engine.pop("g").await.unwrap().is_none());
        let dlq = engine.dlq_view("g", 10).await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].dlq_reason, "max-deliveries");
        assert_eq!(dlq[0].content, b"Z");
    }

    #[tokio::test]
    async fn self_healing_evicts_cache_entry_the_store_disowns() {
        let engine = engine_with(EngineConfig::default());
        let msg = engine.push("g", b"Y".to_vec(), None).await.unwrap();
        // Directly consume in the durable store without going through the
        // engine's cache, simulating a stale cache entry.
        engine
            .store
            .update_if(&msg.consumer_group, Filter::ById(msg.id), Update::Ack { now: Utc::now() })
            .await
            .unwrap();

        assert!(engine.pop("g").await.unwrap().is_none());
        let cached = engine.cache.peek(&msg.consumer_group, 10).await.unwrap();
        assert!(cached.is_empty());
    }
}
