//! Scheduled promoter (component C7): a single-threaded periodic loop
//! migrating due `scheduledAt` records into the cache.

use std::sync::Arc;

use chrono::Utc;
use lightq_core::ConsumerGroup;
use lightq_store::{Filter, Update};
use tracing::{debug, warn};

use crate::engine::Engine;

impl Engine {
    /// Promotes up to `max-promotions-per-run` due messages in `group`,
    /// scoring each in the cache by its original `scheduledAt` millis so a
    /// just-due message outranks one created now. Returns the number
    /// promoted.
    pub async fn promote_due(&self, group: &ConsumerGroup) -> Result<usize, lightq_store::StoreError> {
        let mut promoted = 0usize;
        while promoted < self.config.max_promotions_per_run {
            let now = Utc::now();
            let prior = self
                .store_call(self.store.find_and_modify(
                    group,
                    Filter::DueScheduled { now },
                    Update::UnsetScheduled,
                    None,
                    false,
                ))
                .await?;
            let Some(msg) = prior else {
                break;
            };
            let Some(scheduled_at) = msg.scheduled_at else {
                warn!(group = group.as_str(), id = %msg.id, "promoter matched a message without scheduledAt");
                continue;
            };
            if let Err(e) = self.cache_call(self.cache.add_scored(group, &msg, scheduled_at.timestamp_millis())).await {
                warn!(group = group.as_str(), id = %msg.id, error = %e, "cache add failed during promotion");
            }
            #[cfg(feature = "metrics")]
            crate::metrics::record_promotion(group.as_str());
            promoted += 1;
        }
        Ok(promoted)
    }

    /// Spawns the background promoter loop over `groups`, ticking every
    /// `scheduled-promoter-rate-ms`. The loop runs until the returned
    /// handle is aborted or dropped causes cancellation; each promotion is
    /// an atomic per-step operation, so there is no partial unit of work
    /// to unwind on shutdown.
    pub fn spawn_promoter(self: &Arc<Self>, groups: Vec<ConsumerGroup>) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        let interval = engine.config.scheduled_promoter_rate();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for group in &groups {
                    match engine.promote_due(group).await {
                        Ok(count) if count > 0 => debug!(group = group.as_str(), count, "promoted scheduled messages"),
                        Ok(_) => {}
                        Err(e) => warn!(group = group.as_str(), error = %e, "scheduled promotion tick failed"),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use lightq_cache_memory::MemoryCache;
    use lightq_store_memory::MemoryStore;
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new(Duration::from_secs(300), 1000)),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn due_scheduled_message_is_promoted_into_cache() {
        let engine = engine();
        let past_due = Utc::now() - chrono::Duration::seconds(1);
        let msg = engine.push("g", b"S".to_vec(), Some(past_due)).await.unwrap();

        assert!(engine.cache.peek(&msg.consumer_group, 10).await.unwrap().is_empty());
        let promoted = engine.promote_due(&msg.consumer_group).await.unwrap();
        assert_eq!(promoted, 1);

        let cached = engine.cache.peek(&msg.consumer_group, 10).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, msg.id);
    }

    #[tokio::test]
    async fn not_yet_due_message_is_not_promoted() {
        let engine = engine();
        let future = Utc::now() + chrono::Duration::seconds(60);
        let msg = engine.push("g", b"S".to_vec(), Some(future)).await.unwrap();

        let promoted = engine.promote_due(&msg.consumer_group).await.unwrap();
        assert_eq!(promoted, 0);
        assert!(engine.cache.peek(&msg.consumer_group, 10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_promoter_loop_picks_up_due_message_on_its_own() {
        let engine = Arc::new(engine());
        let past_due = Utc::now() - chrono::Duration::seconds(1);
        let msg = engine.push("g", b"S".to_vec(), Some(past_due)).await.unwrap();

        let handle = engine.spawn_promoter(vec![msg.consumer_group.clone()]);
        tokio::time::advance(engine.config.scheduled_promoter_rate() + Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        let cached = engine.cache.peek(&msg.consumer_group, 10).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, msg.id);

        handle.abort();
    }
}
