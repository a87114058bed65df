//! Dead-letter queue service (component C6). A pure sink: the reservation
//! engine calls in, this module never calls back out to C4.

use chrono::Utc;
use lightq_core::{ConsumerGroup, DlqEntry, LightQError, Message, MessageId};
use lightq_store::{Filter, Update};

use crate::engine::Engine;
use crate::retry::with_retry;

impl Engine {
    /// Moves `msg` to `group`'s DLQ sub-collection with `reason`, and
    /// atomically marks the live document consumed. Called by the
    /// reservation engine when `deliveryCount` exceeds the configured cap.
    pub(crate) async fn move_to_dlq(&self, msg: &Message, group: &ConsumerGroup, reason: &str) -> Result<(), LightQError> {
        if self.config.dlq_ttl_minutes > 0 {
            let dlq_memo_key = format!("{group}:dlq");
            if self.index_memo.needs_ensure(&dlq_memo_key) {
                self.store_call(self.store.ensure_dlq_index(group))
                    .await
                    .map_err(|e| LightQError::Internal(format!("dlq index ensurance failed: {e}")))?;
            }
        }

        let now = Utc::now();
        let entry = DlqEntry::from_message(msg, now, reason);
        with_retry("dlq_insert", || self.store_call(self.store.dlq_insert(group, entry.clone())))
            .await
            .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;

        with_retry("dlq_move_live", || {
            self.store_call(self.store.update_if(group, Filter::ByIdUnconsumed(msg.id), Update::MoveToDlq))
        })
        .await
        .map_err(|e| LightQError::StoreUnavailable(Box::new(e)))?;

        #[cfg(feature = "metrics")]
        crate::metrics::record_dlq_move(group.as_str(), reason);
        Ok(())
    }

    /// Returns the most recent DLQ entries for `group`, newest first.
    pub async fn dlq_view(&self, group: &str, limit: usize) -> Result<Vec<DlqEntry>, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let limit = limit.min(self.config.message_allowed_to_fetch).max(1);
        self.store_call(self.store.dlq_view(&group, limit))
            .await
            .map_err(|e| LightQError::Internal(format!("dlq view failed: {e}")))
    }

    /// Replays each of `ids`: loads the DLQ entry, mints a fresh live
    /// message with a new id, inserts it and adds it to the cache, then
    /// deletes the DLQ entry. Returns the number of ids actually replayed.
    pub async fn dlq_replay(&self, group: &str, ids: Vec<MessageId>) -> Result<u64, LightQError> {
        let group = ConsumerGroup::parse(group)?;
        let mut replayed = 0u64;

        for id in ids {
            let entry = self
                .store_call(self.store.dlq_find_by_id(&group, id))
                .await
                .map_err(|e| LightQError::Internal(format!("dlq lookup failed: {e}")))?;
            let Some(entry) = entry else { continue };
            if entry.content.is_empty() {
                continue;
            }

            let fresh = entry.to_replayed_message(Utc::now());
            let inserted = with_retry("dlq_replay_insert", || self.store_call(self.store.insert(&group, fresh.clone()))).await;
            if inserted.is_err() {
                continue;
            }
            if let Err(e) = self.cache_call(self.cache.add(&group, &fresh)).await {
                tracing::warn!(group = group.as_str(), error = %e, "cache add failed during DLQ replay");
            }
            let _ = self.store_call(self.store.dlq_remove(&group, id)).await;
            replayed += 1;
        }

        Ok(replayed)
    }
}
