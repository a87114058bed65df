use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use lightq_cache::{CacheResult, CacheStore};
use lightq_core::{ConsumerGroup, Message, MessageId};
use tokio::sync::Mutex;

struct GroupSet {
    entries: BTreeMap<(i64, MessageId), Message>,
    expires_at: Option<Instant>,
}

impl GroupSet {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            expires_at: None,
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|e| Instant::now() >= e)
    }
}

/// In-process scored-set cache keyed by `(score, id)`. TTL is tracked per
/// group and refreshed on every write, mirroring a single Redis key's
/// expiry rather than per-member expiry.
pub struct MemoryCache {
    groups: Mutex<HashMap<String, GroupSet>>,
    ttl: Duration,
    max_entries_per_group: usize,
}

impl MemoryCache {
    /// Creates an empty cache with the given TTL and per-group capacity.
    pub fn new(ttl: Duration, max_entries_per_group: usize) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            ttl,
            max_entries_per_group,
        }
    }

    fn insert_scored(set: &mut GroupSet, msg: &Message, score_millis: i64, ttl: Duration, cap: usize) {
        set.entries.insert((score_millis, msg.id), msg.clone());
        set.expires_at = Some(Instant::now() + ttl);
        while set.entries.len() > cap {
            // Drop the highest-scored (newest) entry on overflow.
            let Some(key) = set.entries.keys().next_back().copied() else {
                break;
            };
            set.entries.remove(&key);
            #[cfg(feature = "metrics")]
            lightq_cache::metrics::record_evicted_newest(&msg.consumer_group.to_string(), 1);
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn add(&self, group: &ConsumerGroup, msg: &Message) -> CacheResult<()> {
        self.add_scored(group, msg, msg.created_at.timestamp_millis()).await
    }

    async fn add_scored(&self, group: &ConsumerGroup, msg: &Message, score_millis: i64) -> CacheResult<()> {
        let mut groups = self.groups.lock().await;
        let set = groups.entry(group.as_str().to_string()).or_insert_with(GroupSet::new);
        if set.expired() {
            set.entries.clear();
        }
        Self::insert_scored(set, msg, score_millis, self.ttl, self.max_entries_per_group);
        Ok(())
    }

    async fn add_many(&self, group: &ConsumerGroup, msgs: &[Message]) -> CacheResult<()> {
        let mut groups = self.groups.lock().await;
        let set = groups.entry(group.as_str().to_string()).or_insert_with(GroupSet::new);
        if set.expired() {
            set.entries.clear();
        }
        for msg in msgs {
            Self::insert_scored(
                set,
                msg,
                msg.created_at.timestamp_millis(),
                self.ttl,
                self.max_entries_per_group,
            );
        }
        Ok(())
    }

    async fn pop(&self, group: &ConsumerGroup) -> CacheResult<Option<Message>> {
        let mut groups = self.groups.lock().await;
        let Some(set) = groups.get_mut(group.as_str()) else {
            return Ok(None);
        };
        if set.expired() {
            set.entries.clear();
            return Ok(None);
        }
        let Some(key) = set.entries.keys().next().copied() else {
            return Ok(None);
        };
        Ok(set.entries.remove(&key))
    }

    async fn peek(&self, group: &ConsumerGroup, limit: usize) -> CacheResult<Vec<Message>> {
        let mut groups = self.groups.lock().await;
        let Some(set) = groups.get_mut(group.as_str()) else {
            return Ok(Vec::new());
        };
        if set.expired() {
            set.entries.clear();
            return Ok(Vec::new());
        }
        Ok(set.entries.values().take(limit).cloned().collect())
    }

    async fn remove_one(&self, group: &ConsumerGroup, id: MessageId) -> CacheResult<bool> {
        let mut groups = self.groups.lock().await;
        let Some(set) = groups.get_mut(group.as_str()) else {
            return Ok(false);
        };
        let key = set.entries.iter().find(|((_, k), _)| *k == id).map(|(k, _)| *k);
        match key {
            Some(key) => {
                set.entries.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn group() -> ConsumerGroup {
        ConsumerGroup::parse("g").unwrap()
    }

    #[tokio::test]
    async fn pop_returns_oldest_first() {
        let cache = MemoryCache::new(Duration::from_secs(60), 100);
        let base = Utc::now();
        let older = Message::new(group(), b"older".to_vec(), base - ChronoDuration::seconds(5), None);
        let newer = Message::new(group(), b"newer".to_vec(), base, None);
        cache.add(&group(), &newer).await.unwrap();
        cache.add(&group(), &older).await.unwrap();

        let popped = cache.pop(&group()).await.unwrap().unwrap();
        assert_eq!(popped.content, b"older");
    }

    #[tokio::test]
    async fn over_capacity_drops_newest() {
        let cache = MemoryCache::new(Duration::from_secs(60), 2);
        let base = Utc::now();
        for i in 0..3 {
            let msg = Message::new(group(), vec![i], base + ChronoDuration::seconds(i as i64), None);
            cache.add(&group(), &msg).await.unwrap();
        }
        let remaining = cache.peek(&group(), 10).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].content, vec![0]);
        assert_eq!(remaining[1].content, vec![1]);
    }

    #[tokio::test]
    async fn remove_one_by_id() {
        let cache = MemoryCache::new(Duration::from_secs(60), 100);
        let msg = Message::new(group(), b"x".to_vec(), Utc::now(), None);
        cache.add(&group(), &msg).await.unwrap();
        assert!(cache.remove_one(&group(), msg.id).await.unwrap());
        assert!(cache.peek(&group(), 10).await.unwrap().is_empty());
        assert!(!cache.remove_one(&group(), msg.id).await.unwrap());
    }
}
