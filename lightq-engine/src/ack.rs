//! Ack state machine (component C5): ack / nack / extend-visibility,
//! idempotent, expressed purely as atomic CAS on the durable store.

use chrono::{Duration, Utc};
use lightq_core::{ConsumerGroup, LightQError, MessageId};
use lightq_store::{Filter, Update};

use crate::engine::Engine;

impl Engine {
    /// Marks `id` consumed. Idempotent: a second call on an already-consumed
    /// message still returns success. Fails with [`LightQError::NotFound`]
    /// if `id` never existed in `group`.
    pub async fn ack(&self, group: &str, id: MessageId) -> Result<(), LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let modified = self
            .store_call(self.store.update_if(&group, Filter::ByIdUnconsumed(id), Update::Ack { now: Utc::now() }))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;
        if modified > 0 {
            return Ok(());
        }

        let already_consumed = self
            .store_call(self.store.find_by_id(&group, id))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?
            .is_some_and(|msg| msg.consumed);
        if already_consumed {
            Ok(())
        } else {
            Err(LightQError::NotFound)
        }
    }

    /// Makes `id` immediately reservable again and records `reason`.
    /// A no-op (not an error) if `id` is missing or already consumed.
    pub async fn nack(&self, group: &str, id: MessageId, reason: Option<String>) -> Result<bool, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let now = Utc::now();
        let modified = self
            .store_call(self.store.update_if(&group, Filter::ByIdUnconsumed(id), Update::Nack { now, reason }))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;
        Ok(modified > 0)
    }

    /// Extends `id`'s reservation by `seconds` from now. `seconds <= 0` is
    /// treated as `1`. Returns whether a currently-reserved, unconsumed
    /// document was updated.
    pub async fn extend_visibility(&self, group: &str, id: MessageId, seconds: i64) -> Result<bool, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let now = Utc::now();
        let seconds = seconds.max(1);
        let modified = self
            .store_call(self.store.update_if(
                &group,
                Filter::ByIdReserved { id, now },
                Update::Extend {
                    until: now + Duration::seconds(seconds),
                },
            ))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;
        Ok(modified > 0)
    }

    /// Acks every id in `ids` that is currently unconsumed, returning the
    /// count actually modified.
    pub async fn batch_ack(&self, group: &str, ids: Vec<MessageId>) -> Result<u64, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        self.store_call(self.store.update_if(&group, Filter::ByIdsUnconsumed(ids), Update::Ack { now: Utc::now() }))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use lightq_cache_memory::MemoryCache;
    use lightq_store_memory::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new(StdDuration::from_secs(300), 1000)),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn ack_is_idempotent() {
        let engine = engine();
        let msg = engine.push("g", b"x".to_vec(), None).await.unwrap();
        engine.ack("g", msg.id).await.unwrap();
        engine.ack("g", msg.id).await.unwrap();
        engine.ack("g", msg.id).await.unwrap();
    }

    #[tokio::test]
    async fn ack_missing_id_is_not_found() {
        let engine = engine();
        let err = engine.ack("g", MessageId::new()).await.unwrap_err();
        assert!(matches!(err, LightQError::NotFound));
    }

    #[tokio::test]
    async fn nack_requeues_with_reason() {
        let engine = engine();
        let msg = engine.push("g", b"y".to_vec(), None).await.unwrap();
        let popped = engine.pop("g").await.unwrap().unwrap();
        assert_eq!(popped.id, msg.id);

        assert!(engine.nack("g", msg.id, Some("transient".into())).await.unwrap());
        let repopped = engine.pop("g").await.unwrap().unwrap();
        assert_eq!(repopped.delivery_count, 2);
        assert_eq!(repopped.last_error.as_deref(), Some("transient"));
    }

    #[tokio::test]
    async fn extend_visibility_requires_active_reservation() {
        let engine = engine();
        let msg = engine.push("g", b"z".to_vec(), None).await.unwrap();
        // Not yet reserved: extend is a no-op.
        assert!(!engine.extend_visibility("g", msg.id, 30).await.unwrap());

        engine.pop("g").await.unwrap();
        assert!(engine.extend_visibility("g", msg.id, 30).await.unwrap());
    }

    #[tokio::test]
    async fn batch_ack_acks_only_unconsumed_ids() {
        let engine = engine();
        let a = engine.push("g", b"a".to_vec(), None).await.unwrap();
        let b = engine.push("g", b"b".to_vec(), None).await.unwrap();
        engine.ack("g", a.id).await.unwrap();

        let count = engine.batch_ack("g", vec![a.id, b.id]).await.unwrap();
        assert_eq!(count, 1);
    }
}
