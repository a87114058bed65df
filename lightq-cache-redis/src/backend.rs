//! Redis-backed [`CacheStore`]. Each group is a pair of keys: a sorted set
//! `consumerGroupMessages:<group>` (member = message id, score = the
//! time-approximate ordering key) and a companion hash
//! `consumerGroupPayloads:<group>` (field = message id, value = the fixed
//! binary wire encoding of the message). The sorted set gives O(log n)
//! removal by identity; the hash keeps the scored set itself small and lets
//! [`peek`](CacheStore::peek) range without deserializing scores.

use std::time::Duration;

use async_trait::async_trait;
use lightq_cache::wire;
use lightq_cache::{CacheError, CacheResult, CacheStore};
use lightq_core::{ConsumerGroup, Message, MessageId};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::Error;

fn messages_key(group: &ConsumerGroup) -> String {
    format!("consumerGroupMessages:{group}")
}

fn payloads_key(group: &ConsumerGroup) -> String {
    format!("consumerGroupPayloads:{group}")
}

/// Distributed cache store backed by Redis.
pub struct RedisCache {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    ttl: Duration,
    max_entries_per_group: usize,
}

impl RedisCache {
    /// Starts building a [`RedisCache`] pointed at `redis://127.0.0.1/` with
    /// a one-hour TTL and a 10,000 entry per-group cap.
    pub fn builder() -> RedisCacheBuilder {
        RedisCacheBuilder::default()
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async { self.client.get_connection_manager().await })
            .await
            .map_err(|e| CacheError::from(Error::from(e)))?;
        Ok(manager.clone())
    }

    async fn trim(&self, con: &mut ConnectionManager, group: &ConsumerGroup) -> CacheResult<()> {
        let mkey = messages_key(group);
        let pkey = payloads_key(group);
        let cap = self.max_entries_per_group;

        let card: usize = con.zcard(&mkey).await.map_err(Error::from)?;
        if card <= cap {
            return Ok(());
        }

        let overflow: Vec<String> = con
            .zrange(&mkey, cap as isize, -1)
            .await
            .map_err(Error::from)?;
        if overflow.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &overflow {
            pipe.zrem(&mkey, id).ignore();
            pipe.hdel(&pkey, id).ignore();
        }
        pipe.query_async::<()>(con).await.map_err(Error::from)?;

        #[cfg(feature = "metrics")]
        lightq_cache::metrics::record_evicted_newest(group.as_str(), overflow.len() as u64);
        Ok(())
    }
}

/// Builder for [`RedisCache`].
pub struct RedisCacheBuilder {
    connection_info: String,
    ttl: Duration,
    max_entries_per_group: usize,
}

impl Default for RedisCacheBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
            ttl: Duration::from_secs(3600),
            max_entries_per_group: 10_000,
        }
    }
}

impl RedisCacheBuilder {
    /// Sets the Redis connection URL.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Sets the per-group TTL applied to both keys on every write.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the per-group entry cap; overflow drops the newest-scored
    /// entries first.
    pub fn max_entries_per_group(mut self, max_entries_per_group: usize) -> Self {
        self.max_entries_per_group = max_entries_per_group;
        self
    }

    /// Builds the [`RedisCache`]. The connection itself is established
    /// lazily on first use.
    pub fn build(self) -> Result<RedisCache, Error> {
        Ok(RedisCache {
            client: redis::Client::open(self.connection_info)?,
            connection: OnceCell::new(),
            ttl: self.ttl,
            max_entries_per_group: self.max_entries_per_group,
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn add(&self, group: &ConsumerGroup, msg: &Message) -> CacheResult<()> {
        self.add_scored(group, msg, msg.created_at.timestamp_millis()).await
    }

    async fn add_scored(&self, group: &ConsumerGroup, msg: &Message, score_millis: i64) -> CacheResult<()> {
        let mut con = self.connection().await?;
        let mkey = messages_key(group);
        let pkey = payloads_key(group);
        let id = msg.id.to_string();
        let bytes = wire::encode(msg).map_err(lightq_cache::CacheError::Wire)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.zadd(&mkey, &id, score_millis).ignore();
        pipe.hset(&pkey, &id, bytes).ignore();
        pipe.expire(&mkey, self.ttl.as_secs() as i64).ignore();
        pipe.expire(&pkey, self.ttl.as_secs() as i64).ignore();
        pipe.query_async::<()>(&mut con).await.map_err(Error::from)?;

        self.trim(&mut con, group).await
    }

    async fn add_many(&self, group: &ConsumerGroup, msgs: &[Message]) -> CacheResult<()> {
        if msgs.is_empty() {
            return Ok(());
        }
        let mut con = self.connection().await?;
        let mkey = messages_key(group);
        let pkey = payloads_key(group);

        let mut pipe = redis::pipe();
        pipe.atomic();
        for msg in msgs {
            let id = msg.id.to_string();
            let bytes = wire::encode(msg).map_err(lightq_cache::CacheError::Wire)?;
            pipe.zadd(&mkey, &id, msg.created_at.timestamp_millis()).ignore();
            pipe.hset(&pkey, &id, bytes).ignore();
        }
        pipe.expire(&mkey, self.ttl.as_secs() as i64).ignore();
        pipe.expire(&pkey, self.ttl.as_secs() as i64).ignore();
        pipe.query_async::<()>(&mut con).await.map_err(Error::from)?;

        self.trim(&mut con, group).await
    }

    async fn pop(&self, group: &ConsumerGroup) -> CacheResult<Option<Message>> {
        let mut con = self.connection().await?;
        let mkey = messages_key(group);
        let pkey = payloads_key(group);

        let popped: Vec<(String, f64)> = con.zpopmin(&mkey, 1).await.map_err(Error::from)?;
        let Some((id, _score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        let bytes: Option<Vec<u8>> = con.hget(&pkey, &id).await.map_err(Error::from)?;
        let _: () = con.hdel(&pkey, &id).await.map_err(Error::from)?;
        let Some(bytes) = bytes else {
            warn!(id = %id, group = group.as_str(), "popped id missing from payload hash");
            return Ok(None);
        };
        let msg = wire::decode(&bytes, group).map_err(lightq_cache::CacheError::Wire)?;
        Ok(Some(msg))
    }

    async fn peek(&self, group: &ConsumerGroup, limit: usize) -> CacheResult<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut con = self.connection().await?;
        let mkey = messages_key(group);
        let pkey = payloads_key(group);

        let ids: Vec<String> = con
            .zrange(&mkey, 0, limit as isize - 1)
            .await
            .map_err(Error::from)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Option<Vec<u8>>> = con.hget(&pkey, &ids).await.map_err(Error::from)?;
        let mut out = Vec::with_capacity(ids.len());
        for (id, bytes) in ids.iter().zip(raw) {
            match bytes {
                Some(bytes) => out.push(wire::decode(&bytes, group).map_err(lightq_cache::CacheError::Wire)?),
                None => warn!(id, group = group.as_str(), "peeked id missing from payload hash"),
            }
        }
        Ok(out)
    }

    async fn remove_one(&self, group: &ConsumerGroup, id: MessageId) -> CacheResult<bool> {
        let mut con = self.connection().await?;
        let mkey = messages_key(group);
        let pkey = payloads_key(group);
        let id = id.to_string();

        let removed: i64 = con.zrem(&mkey, &id).await.map_err(Error::from)?;
        let _: () = con.hdel(&pkey, &id).await.map_err(Error::from)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_group() {
        let group = ConsumerGroup::parse("orders").unwrap();
        assert_eq!(messages_key(&group), "consumerGroupMessages:orders");
        assert_eq!(payloads_key(&group), "consumerGroupPayloads:orders");
    }

    #[test]
    fn builder_defaults_are_sane() {
        let cache = RedisCache::builder().build().unwrap();
        assert_eq!(cache.max_entries_per_group, 10_000);
        assert_eq!(cache.ttl, Duration::from_secs(3600));
    }
}
