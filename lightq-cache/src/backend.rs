use async_trait::async_trait;
use lightq_core::{ConsumerGroup, Message, MessageId};

use crate::error::CacheError;

/// Result type for [`CacheStore`] operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Per-group scored set fronting the durable store (component C2).
///
/// Keyed by `consumerGroupMessages:<group>`; members are the message id,
/// scored by a time-approximate ordering key so the lowest score is the
/// oldest message — removal by identity is then a single O(log n)
/// operation rather than a linear scan. Every write refreshes the key's
/// TTL and trims the set to `cache-max-entries-per-group` by dropping the
/// *highest*-scored (newest) entries when over capacity.
///
/// Implementations are never consulted directly by the engine — callers go
/// through [`crate::CircuitBreakerCache`], which degrades failures instead
/// of propagating them.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Adds `msg`, scored by its `createdAt` epoch millis.
    async fn add(&self, group: &ConsumerGroup, msg: &Message) -> CacheResult<()>;

    /// Adds `msg` with an explicit `score_millis`, used by the scheduled
    /// promoter to score a just-activated message by its original
    /// `scheduledAt` rather than the current instant.
    async fn add_scored(&self, group: &ConsumerGroup, msg: &Message, score_millis: i64) -> CacheResult<()>;

    /// Adds every message in `msgs` to `group`'s set in one pipelined unit,
    /// each scored by its own `createdAt`.
    async fn add_many(&self, group: &ConsumerGroup, msgs: &[Message]) -> CacheResult<()>;

    /// Pops the lowest-scored message, if any. The caller must still win an
    /// atomic reservation in the durable store before treating it as
    /// delivered.
    async fn pop(&self, group: &ConsumerGroup) -> CacheResult<Option<Message>>;

    /// Returns up to `limit` messages ordered lowest score (oldest) first.
    async fn peek(&self, group: &ConsumerGroup, limit: usize) -> CacheResult<Vec<Message>>;

    /// Removes the message identified by `id`, returning whether it was
    /// present.
    async fn remove_one(&self, group: &ConsumerGroup, id: MessageId) -> CacheResult<bool>;

    /// Drains any client-side buffering before the process exits. The
    /// default is a no-op; the caller bounds this with
    /// `cache-shutdown-timeout-seconds` rather than waiting indefinitely.
    async fn shutdown(&self) {}
}
