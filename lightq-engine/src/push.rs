//! Push engine (component C3): validates, assigns an id, and writes
//! through or behind to the durable store and cache.

use chrono::{DateTime, Utc};
use lightq_core::{ConsumerGroup, LightQError, Message, message::validate_content};
use tracing::{error, warn};

use crate::config::PersistencePolicy;
use crate::engine::Engine;
use crate::retry::with_retry;

impl Engine {
    /// Pushes a single message into `group`, optionally deferred until
    /// `scheduled_at`. Returns the created message with its assigned id.
    pub async fn push(
        &self,
        group: &str,
        content: Vec<u8>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Message, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        validate_content(&content)?;
        self.check_async_scheduled_policy(scheduled_at)?;
        self.ensure_indexes_or_internal(&group).await?;

        let now = Utc::now();
        let msg = Message::new(group.clone(), content, now, scheduled_at);

        match self.config.persistence_policy {
            PersistencePolicy::WriteThrough => {
                self.durable_insert_with_retry(&group, msg.clone()).await?;
                self.maybe_cache_add(&group, &msg, now).await;
            }
            PersistencePolicy::WriteBehind => {
                self.maybe_cache_add(&group, &msg, now).await;
                self.spawn_write_behind_insert(group, msg.clone());
            }
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record_push(msg.consumer_group.as_str(), policy_label(self.config.persistence_policy));
        Ok(msg)
    }

    /// Validates and pushes a batch in one grouped round trip per consumer
    /// group: one durable bulk insert, one cache pipelined `AddMany`,
    /// skipping future-scheduled items in the cache write.
    pub async fn batch_push(
        &self,
        group: &str,
        contents: Vec<Vec<u8>>,
    ) -> Result<Vec<Message>, LightQError> {
        if contents.is_empty() {
            return Err(LightQError::Validation("batch push requires at least one item".into()));
        }
        let group = ConsumerGroup::parse(group)?;
        for content in &contents {
            validate_content(content)?;
        }
        self.ensure_indexes_or_internal(&group).await?;

        let now = Utc::now();
        let messages: Vec<Message> = contents
            .into_iter()
            .map(|content| Message::new(group.clone(), content, now, None))
            .collect();

        match self.config.persistence_policy {
            PersistencePolicy::WriteThrough => {
                self.durable_insert_many_with_retry(&group, messages.clone()).await?;
                self.cache_add_many_due(&group, &messages, now).await;
            }
            PersistencePolicy::WriteBehind => {
                self.cache_add_many_due(&group, &messages, now).await;
                self.spawn_write_behind_insert_many(group.clone(), messages.clone());
            }
        }

        #[cfg(feature = "metrics")]
        for _ in 0..messages.len() {
            crate::metrics::record_push(group.as_str(), policy_label(self.config.persistence_policy));
        }
        Ok(messages)
    }

    fn check_async_scheduled_policy(&self, scheduled_at: Option<DateTime<Utc>>) -> Result<(), LightQError> {
        if scheduled_at.is_some()
            && matches!(self.config.persistence_policy, PersistencePolicy::WriteBehind)
            && !self.config.allow_async_scheduled
        {
            return Err(LightQError::Validation(
                "write-behind persistence combined with scheduledAt is rejected unless allow_async_scheduled is set"
                    .into(),
            ));
        }
        Ok(())
    }

    async fn ensure_indexes_or_internal(&self, group: &ConsumerGroup) -> Result<(), LightQError> {
        self.ensure_indexes(group)
            .await
            .map_err(|e| LightQError::Internal(format!("index ensurance failed: {e}")))
    }

    async fn durable_insert_with_retry(&self, group: &ConsumerGroup, msg: Message) -> Result<(), LightQError> {
        with_retry("push_insert", || self.store_call(self.store.insert(group, msg.clone())))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))
    }

    async fn durable_insert_many_with_retry(&self, group: &ConsumerGroup, msgs: Vec<Message>) -> Result<(), LightQError> {
        with_retry("push_insert_many", || self.store_call(self.store.insert_many(group, msgs.clone())))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))
    }

    async fn maybe_cache_add(&self, group: &ConsumerGroup, msg: &Message, now: DateTime<Utc>) {
        if !msg.is_future_scheduled(now) {
            if let Err(e) = self.cache_call(self.cache.add(group, msg)).await {
                warn!(group = group.as_str(), error = %e, "cache add failed during push");
            }
        }
    }

    async fn cache_add_many_due(&self, group: &ConsumerGroup, msgs: &[Message], now: DateTime<Utc>) {
        let due: Vec<Message> = msgs.iter().filter(|m| !m.is_future_scheduled(now)).cloned().collect();
        if due.is_empty() {
            return;
        }
        if let Err(e) = self.cache_call(self.cache.add_many(group, &due)).await {
            warn!(group = group.as_str(), error = %e, "cache add_many failed during batch push");
        }
    }

    fn spawn_write_behind_insert(&self, group: ConsumerGroup, msg: Message) {
        let Some(pool) = &self.worker_pool else {
            error!("write-behind policy configured without a worker pool");
            return;
        };
        let store = self.store.clone();
        let timeout = self.config.cache_command_timeout();
        let group_label = group.as_str().to_string();
        let submitted = pool.submit(async move {
            let result =
                with_retry("write_behind_insert", || crate::engine::bound_store(timeout, store.insert(&group, msg.clone())))
                    .await;
            if let Err(e) = result {
                error!(group = %group_label, error = %e, "write-behind insert exhausted retries; message may only exist in cache until it expires");
                #[cfg(feature = "metrics")]
                crate::metrics::record_push_durability_lost(&group_label);
            }
        });
        if !submitted {
            #[cfg(feature = "metrics")]
            crate::metrics::record_worker_pool_rejected();
        }
    }

    fn spawn_write_behind_insert_many(&self, group: ConsumerGroup, msgs: Vec<Message>) {
        let Some(pool) = &self.worker_pool else {
            error!("write-behind policy configured without a worker pool");
            return;
        };
        let store = self.store.clone();
        let timeout = self.config.cache_command_timeout();
        let group_label = group.as_str().to_string();
        let submitted = pool.submit(async move {
            let result = with_retry("write_behind_insert_many", || {
                crate::engine::bound_store(timeout, store.insert_many(&group, msgs.clone()))
            })
            .await;
            if let Err(e) = result {
                error!(group = %group_label, error = %e, "write-behind batch insert exhausted retries");
                #[cfg(feature = "metrics")]
                crate::metrics::record_push_durability_lost(&group_label);
            }
        });
        if !submitted {
            #[cfg(feature = "metrics")]
            crate::metrics::record_worker_pool_rejected();
        }
    }
}

fn policy_label(policy: PersistencePolicy) -> &'static str {
    match policy {
        PersistencePolicy::WriteThrough => "write-through",
        PersistencePolicy::WriteBehind => "write-behind",
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
    async fn push_assigns_id_and_is_immediately_poppable_from_cache() {
        let engine = engine();
        let msg = engine.push("g1", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(msg.content, b"hello");
        assert!(!msg.consumed);
        assert_eq!(msg.delivery_count, 0);

        let cached = engine.cache.peek(&msg.consumer_group, 10).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, msg.id);
    }

    #[tokio::test]
    async fn future_scheduled_push_is_withheld_from_cache() {
        let engine = engine();
        let due = Utc::now() + chrono::Duration::seconds(60);
        let msg = engine.push("g1", b"later".to_vec(), Some(due)).await.unwrap();

        let cached = engine.cache.peek(&msg.consumer_group, 10).await.unwrap();
        assert!(cached.is_empty());

        let stored = engine.store.find_by_id(&msg.consumer_group, msg.id).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn rejects_bad_group_before_any_side_effect() {
        let engine = engine();
        let err = engine.push("bad group!", b"x".to_vec(), None).await.unwrap_err();
        assert!(matches!(err, LightQError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_empty_content() {
        let engine = engine();
        let err = engine.push("g1", Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, LightQError::Validation(_)));
    }

    #[tokio::test]
    async fn batch_push_writes_all_items_through() {
        let engine = engine();
        let msgs = engine
            .batch_push("g1", vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .await
            .unwrap();
        assert_eq!(msgs.len(), 3);
        let cached = engine.cache.peek(&msgs[0].consumer_group, 10).await.unwrap();
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn batch_push_rejects_empty_batch() {
        let engine = engine();
        let err = engine.batch_push("g1", Vec::new()).await.unwrap_err();
        assert!(matches!(err, LightQError::Validation(_)));
    }
}
