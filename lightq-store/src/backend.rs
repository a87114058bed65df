use async_trait::async_trait;
use lightq_core::{ConsumerGroup, DlqEntry, Message, MessageId};

use crate::error::StoreError;
use crate::query::{Filter, Sort, Update};

/// Result type for [`DurableStore`] operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Per-group durable document collection with atomic find-and-modify
/// (component C1). A per-process implementation owns one physical
/// collection named exactly `<consumerGroup>` plus a DLQ sub-collection
/// named `<consumerGroup><dlq-suffix>`.
///
/// All reservation, ack, nack, and DLQ transitions are expressed through
/// [`DurableStore::find_and_modify`] or [`DurableStore::update_if`] with an
/// explicit [`Filter`]/[`Update`] pair — never as an optimistic
/// read-then-write at the caller.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Ensures the partial TTL and compound reservation indexes exist for
    /// `group`'s live collection. Implementations should make this cheap to
    /// call repeatedly; callers memoize it with [`crate::IndexMemo`] so it
    /// only round-trips to the backend once per group per process.
    async fn ensure_indexes(&self, group: &ConsumerGroup) -> StoreResult<()>;

    /// Inserts a single message into `group`'s live collection.
    async fn insert(&self, group: &ConsumerGroup, msg: Message) -> StoreResult<()>;

    /// Inserts a batch of messages belonging to the same group in one
    /// round trip.
    async fn insert_many(&self, group: &ConsumerGroup, msgs: Vec<Message>) -> StoreResult<()>;

    /// Looks up a single message by id.
    async fn find_by_id(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<Option<Message>>;

    /// Applies `update` to every document matching `filter`, returning the
    /// number of documents modified. Atomic.
    async fn update_if(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        update: Update,
    ) -> StoreResult<u64>;

    /// Atomically applies `update` to the single document matching
    /// `filter` and returns it. `sort` breaks ties among multiple matches
    /// (e.g. `reserveOldestAvailable` sorts by `createdAt asc`).
    /// `return_new` selects whether the returned document reflects the
    /// state before or after the update.
    async fn find_and_modify(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        update: Update,
        sort: Option<Sort>,
        return_new: bool,
    ) -> StoreResult<Option<Message>>;

    /// Returns up to `limit` documents matching `filter`, ordered by
    /// `sort` if given.
    async fn find(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        sort: Option<Sort>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Message>>;

    /// Deletes every document matching `filter`, returning the count
    /// removed.
    async fn remove(&self, group: &ConsumerGroup, filter: Filter) -> StoreResult<u64>;

    /// Ensures the DLQ sub-collection's TTL index exists, if
    /// `dlq-ttl-minutes` is configured positive.
    async fn ensure_dlq_index(&self, group: &ConsumerGroup) -> StoreResult<()>;

    /// Inserts a DLQ entry into `group`'s DLQ sub-collection.
    async fn dlq_insert(&self, group: &ConsumerGroup, entry: DlqEntry) -> StoreResult<()>;

    /// Looks up a DLQ entry by id.
    async fn dlq_find_by_id(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<Option<DlqEntry>>;

    /// Returns the most recent `limit` DLQ entries, sorted by `failedAt desc`.
    async fn dlq_view(&self, group: &ConsumerGroup, limit: usize) -> StoreResult<Vec<DlqEntry>>;

    /// Deletes a DLQ entry by id, returning whether one existed.
    async fn dlq_remove(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<bool>;
}
