use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use lightq_core::{ConsumerGroup, DlqEntry, Message, MessageId};
use lightq_store::{DurableStore, Filter, Sort, StoreResult, Update};

/// In-process [`DurableStore`] guarding each group's live and DLQ
/// collections behind an async mutex. Index management is a no-op: there
/// is nothing to index in a linear scan over a `Vec`.
#[derive(Default)]
pub struct MemoryStore {
    live: DashMap<String, Mutex<Vec<Message>>>,
    dlq: DashMap<String, Mutex<Vec<DlqEntry>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn live_collection(&self, group: &ConsumerGroup) -> dashmap::mapref::one::Ref<'_, String, Mutex<Vec<Message>>> {
        self.live
            .entry(group.as_str().to_string())
            .or_default();
        self.live.get(group.as_str()).expect("just inserted")
    }

    fn dlq_collection(&self, group: &ConsumerGroup) -> dashmap::mapref::one::Ref<'_, String, Mutex<Vec<DlqEntry>>> {
        self.dlq
            .entry(group.as_str().to_string())
            .or_default();
        self.dlq.get(group.as_str()).expect("just inserted")
    }
}

fn matches(msg: &Message, filter: &Filter) -> bool {
    match filter {
        Filter::ById(id) => msg.id == *id,
        Filter::ByIdUnconsumed(id) => msg.id == *id && !msg.consumed,
        Filter::ByIdConsumed(id) => msg.id == *id && msg.consumed,
        Filter::ByIdReserved { id, now } => {
            msg.id == *id && !msg.consumed && msg.reserved_until.is_some_and(|ru| ru > *now)
        }
        Filter::ByIdReservable { id, now } => msg.id == *id && msg.is_reservable(*now),
        Filter::Reservable { now } => msg.is_reservable(*now),
        Filter::DueScheduled { now } => !msg.consumed && msg.scheduled_at.is_some_and(|sa| sa <= *now),
        Filter::ByIdsUnconsumed(ids) => !msg.consumed && ids.contains(&msg.id),
        Filter::Consumed(want) => msg.consumed == *want,
        Filter::Any => true,
    }
}

fn apply(msg: &mut Message, update: &Update) {
    match update {
        Update::Reserve {
            now,
            visibility_timeout,
        } => {
            msg.delivery_count += 1;
            msg.reserved_until = Some(*now + *visibility_timeout);
            msg.last_delivery_at = Some(*now);
        }
        Update::Ack { .. } => {
            msg.consumed = true;
            msg.reserved_until = None;
        }
        Update::Nack { now, reason } => {
            msg.reserved_until = Some(*now);
            if let Some(reason) = reason {
                msg.last_error = Some(reason.clone());
            }
        }
        Update::Extend { until } => {
            msg.reserved_until = Some(*until);
        }
        Update::UnsetScheduled => {
            msg.scheduled_at = None;
        }
        Update::MoveToDlq => {
            msg.consumed = true;
            msg.reserved_until = None;
        }
    }
}

fn sort_key(msg: &Message, sort: Sort) -> DateTime<Utc> {
    match sort {
        Sort::CreatedAtAsc => msg.created_at,
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn ensure_indexes(&self, _group: &ConsumerGroup) -> StoreResult<()> {
        Ok(())
    }

    async fn insert(&self, group: &ConsumerGroup, msg: Message) -> StoreResult<()> {
        let coll = self.live_collection(group);
        coll.lock().await.push(msg);
        Ok(())
    }

    async fn insert_many(&self, group: &ConsumerGroup, msgs: Vec<Message>) -> StoreResult<()> {
        let coll = self.live_collection(group);
        coll.lock().await.extend(msgs);
        Ok(())
    }

    async fn find_by_id(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<Option<Message>> {
        let coll = self.live_collection(group);
        let guard = coll.lock().await;
        Ok(guard.iter().find(|m| m.id == id).cloned())
    }

    async fn update_if(&self, group: &ConsumerGroup, filter: Filter, update: Update) -> StoreResult<u64> {
        let coll = self.live_collection(group);
        let mut guard = coll.lock().await;
        let mut modified = 0u64;
        for msg in guard.iter_mut() {
            if matches(msg, &filter) {
                apply(msg, &update);
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn find_and_modify(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        update: Update,
        sort: Option<Sort>,
        return_new: bool,
    ) -> StoreResult<Option<Message>> {
        let coll = self.live_collection(group);
        let mut guard = coll.lock().await;

        let idx = match sort {
            Some(s) => guard
                .iter()
                .enumerate()
                .filter(|(_, m)| matches(m, &filter))
                .min_by_key(|(_, m)| sort_key(m, s))
                .map(|(i, _)| i),
            None => guard.iter().position(|m| matches(m, &filter)),
        };

        let Some(idx) = idx else { return Ok(None) };
        let before = guard[idx].clone();
        apply(&mut guard[idx], &update);
        let after = guard[idx].clone();
        Ok(Some(if return_new { after } else { before }))
    }

    async fn find(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        sort: Option<Sort>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Message>> {
        let coll = self.live_collection(group);
        let guard = coll.lock().await;
        let mut matched: Vec<Message> = guard.iter().filter(|m| matches(m, &filter)).cloned().collect();
        if let Some(s) = sort {
            matched.sort_by_key(|m| sort_key(m, s));
        }
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn remove(&self, group: &ConsumerGroup, filter: Filter) -> StoreResult<u64> {
        let coll = self.live_collection(group);
        let mut guard = coll.lock().await;
        let before = guard.len();
        guard.retain(|m| !matches(m, &filter));
        Ok((before - guard.len()) as u64)
    }

    async fn ensure_dlq_index(&self, _group: &ConsumerGroup) -> StoreResult<()> {
        Ok(())
    }

    async fn dlq_insert(&self, group: &ConsumerGroup, entry: DlqEntry) -> StoreResult<()> {
        let coll = self.dlq_collection(group);
        coll.lock().await.push(entry);
        Ok(())
    }

    async fn dlq_find_by_id(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<Option<DlqEntry>> {
        let coll = self.dlq_collection(group);
        let guard = coll.lock().await;
        Ok(guard.iter().find(|e| e.id == id).cloned())
    }

    async fn dlq_view(&self, group: &ConsumerGroup, limit: usize) -> StoreResult<Vec<DlqEntry>> {
        let coll = self.dlq_collection(group);
        let guard = coll.lock().await;
        let mut entries: Vec<DlqEntry> = guard.clone();
        entries.sort_by_key(|e| std::cmp::Reverse(e.failed_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn dlq_remove(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<bool> {
        let coll = self.dlq_collection(group);
        let mut guard = coll.lock().await;
        let before = guard.len();
        guard.retain(|e| e.id != id);
        Ok(guard.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn group() -> ConsumerGroup {
        ConsumerGroup::parse("g").unwrap()
    }

    #[tokio::test]
    async fn insert_and_find_by_id_round_trips() {
        let store = MemoryStore::new();
        let msg = Message::new(group(), b"hello".to_vec(), Utc::now(), None);
        let id = msg.id;
        store.insert(&group(), msg).await.unwrap();
        let found = store.find_by_id(&group(), id).await.unwrap().unwrap();
        assert_eq!(found.content, b"hello");
    }

    #[tokio::test]
    async fn reserve_is_exclusive_under_concurrent_attempts() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let msg = Message::new(group(), b"x".to_vec(), now, None);
        let id = msg.id;
        store.insert(&group(), msg).await.unwrap();

        let filter = Filter::ByIdReservable { id, now };
        let update = Update::Reserve {
            now,
            visibility_timeout: Duration::seconds(30),
        };
        let first = store
            .find_and_modify(&group(), filter.clone(), update.clone(), None, true)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .find_and_modify(&group(), filter, update, None, true)
            .await
            .unwrap();
        assert!(second.is_none(), "a reserved message must not be reservable again");
    }

    #[tokio::test]
    async fn find_and_modify_oldest_available_respects_sort() {
        let store = MemoryStore::new();
        let base = Utc::now();
        let older = Message::new(group(), b"older".to_vec(), base - Duration::seconds(5), None);
        let newer = Message::new(group(), b"newer".to_vec(), base, None);
        store.insert(&group(), newer).await.unwrap();
        store.insert(&group(), older).await.unwrap();

        let got = store
            .find_and_modify(
                &group(),
                Filter::Reservable { now: base },
                Update::Reserve {
                    now: base,
                    visibility_timeout: Duration::seconds(30),
                },
                Some(Sort::CreatedAtAsc),
                true,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.content, b"older");
    }

    #[tokio::test]
    async fn nack_without_reason_preserves_prior_last_error() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let msg = Message::new(group(), b"x".to_vec(), now, None);
        let id = msg.id;
        store.insert(&group(), msg).await.unwrap();

        store
            .update_if(
                &group(),
                Filter::ById(id),
                Update::Nack {
                    now,
                    reason: Some("first failure".to_string()),
                },
            )
            .await
            .unwrap();

        store
            .update_if(&group(), Filter::ById(id), Update::Nack { now, reason: None })
            .await
            .unwrap();

        let found = store.find_by_id(&group(), id).await.unwrap().unwrap();
        assert_eq!(found.last_error.as_deref(), Some("first failure"));
    }
}
