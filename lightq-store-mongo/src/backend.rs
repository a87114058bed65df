use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{Binary, Bson, DateTime as BsonDateTime, Document, doc};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use lightq_core::{ConsumerGroup, DlqEntry, Message, MessageId};
use lightq_store::{DurableStore, Filter, Sort, StoreResult, Update};

use crate::error::classify;

fn to_bson_dt(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_chrono(dt)
}

fn from_bson_dt(dt: BsonDateTime) -> DateTime<Utc> {
    dt.to_chrono()
}

#[derive(Debug, Serialize, Deserialize)]
struct MongoMessage {
    #[serde(rename = "_id")]
    id: String,
    consumer_group: String,
    content: Binary,
    created_at: BsonDateTime,
    consumed: bool,
    delivery_count: i64,
    reserved_until: Option<BsonDateTime>,
    last_delivery_at: Option<BsonDateTime>,
    last_error: Option<String>,
    scheduled_at: Option<BsonDateTime>,
}

impl From<Message> for MongoMessage {
    fn from(m: Message) -> Self {
        Self {
            id: m.id.to_string(),
            consumer_group: m.consumer_group.as_str().to_string(),
            content: Binary {
                subtype: mongodb::bson::spec::BinarySubtype::Generic,
                bytes: m.content,
            },
            created_at: to_bson_dt(m.created_at),
            consumed: m.consumed,
            delivery_count: m.delivery_count as i64,
            reserved_until: m.reserved_until.map(to_bson_dt),
            last_delivery_at: m.last_delivery_at.map(to_bson_dt),
            last_error: m.last_error,
            scheduled_at: m.scheduled_at.map(to_bson_dt),
        }
    }
}

impl MongoMessage {
    fn into_message(self, group: &ConsumerGroup) -> Result<Message, String> {
        let id: MessageId = self.id.parse().map_err(|e| format!("invalid message id: {e}"))?;
        Ok(Message {
            id,
            consumer_group: group.clone(),
            content: self.content.bytes,
            created_at: from_bson_dt(self.created_at),
            consumed: self.consumed,
            delivery_count: self.delivery_count as u32,
            reserved_until: self.reserved_until.map(from_bson_dt),
            last_delivery_at: self.last_delivery_at.map(from_bson_dt),
            last_error: self.last_error,
            scheduled_at: self.scheduled_at.map(from_bson_dt),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MongoDlqEntry {
    #[serde(rename = "_id")]
    id: String,
    content: Binary,
    consumer_group: String,
    created_at: BsonDateTime,
    consumed: bool,
    delivery_count: i64,
    last_delivery_at: Option<BsonDateTime>,
    last_error: Option<String>,
    failed_at: BsonDateTime,
    dlq_reason: String,
}

impl From<DlqEntry> for MongoDlqEntry {
    fn from(e: DlqEntry) -> Self {
        Self {
            id: e.id.to_string(),
            content: Binary {
                subtype: mongodb::bson::spec::BinarySubtype::Generic,
                bytes: e.content,
            },
            consumer_group: e.consumer_group.as_str().to_string(),
            created_at: to_bson_dt(e.created_at),
            consumed: e.consumed,
            delivery_count: e.delivery_count as i64,
            last_delivery_at: e.last_delivery_at.map(to_bson_dt),
            last_error: e.last_error,
            failed_at: to_bson_dt(e.failed_at),
            dlq_reason: e.dlq_reason,
        }
    }
}

impl MongoDlqEntry {
    fn into_entry(self, group: &ConsumerGroup) -> Result<DlqEntry, String> {
        let id: MessageId = self.id.parse().map_err(|e| format!("invalid message id: {e}"))?;
        Ok(DlqEntry {
            id,
            content: self.content.bytes,
            consumer_group: group.clone(),
            created_at: from_bson_dt(self.created_at),
            consumed: self.consumed,
            delivery_count: self.delivery_count as u32,
            last_delivery_at: self.last_delivery_at.map(from_bson_dt),
            last_error: self.last_error,
            failed_at: from_bson_dt(self.failed_at),
            dlq_reason: self.dlq_reason,
        })
    }
}

fn reservable_clause(now: DateTime<Utc>) -> Document {
    let now = to_bson_dt(now);
    doc! {
        "consumed": false,
        "$and": [
            { "$or": [ { "reserved_until": Bson::Null }, { "reserved_until": { "$lte": now } } ] },
            { "$or": [ { "scheduled_at": Bson::Null }, { "scheduled_at": { "$lte": now } } ] },
        ],
    }
}

fn filter_to_doc(filter: &Filter) -> Document {
    match filter {
        Filter::ById(id) => doc! { "_id": id.to_string() },
        Filter::ByIdUnconsumed(id) => doc! { "_id": id.to_string(), "consumed": false },
        Filter::ByIdConsumed(id) => doc! { "_id": id.to_string(), "consumed": true },
        Filter::ByIdReserved { id, now } => doc! {
            "_id": id.to_string(),
            "consumed": false,
            "reserved_until": { "$gt": to_bson_dt(*now) },
        },
        Filter::ByIdReservable { id, now } => {
            let mut d = reservable_clause(*now);
            d.insert("_id", id.to_string());
            d
        }
        Filter::Reservable { now } => reservable_clause(*now),
        Filter::DueScheduled { now } => doc! {
            "consumed": false,
            "scheduled_at": { "$lte": to_bson_dt(*now) },
        },
        Filter::ByIdsUnconsumed(ids) => doc! {
            "_id": { "$in": ids.iter().map(MessageId::to_string).collect::<Vec<_>>() },
            "consumed": false,
        },
        Filter::Consumed(want) => doc! { "consumed": *want },
        Filter::Any => doc! {},
    }
}

fn update_to_doc(update: &Update) -> Document {
    match update {
        Update::Reserve { now, visibility_timeout } => {
            let until = to_bson_dt(*now + *visibility_timeout);
            doc! {
                "$inc": { "delivery_count": 1 },
                "$set": { "reserved_until": until, "last_delivery_at": to_bson_dt(*now) },
            }
        }
        Update::Ack { .. } => doc! {
            "$set": { "consumed": true },
            "$unset": { "reserved_until": "" },
        },
        Update::Nack { now, reason } => {
            let mut set = doc! { "reserved_until": to_bson_dt(*now) };
            if let Some(reason) = reason {
                set.insert("last_error", reason);
            }
            doc! { "$set": set }
        }
        Update::Extend { until } => doc! { "$set": { "reserved_until": to_bson_dt(*until) } },
        Update::UnsetScheduled => doc! { "$unset": { "scheduled_at": "" } },
        Update::MoveToDlq => doc! {
            "$set": { "consumed": true },
            "$unset": { "reserved_until": "" },
        },
    }
}

fn sort_to_doc(sort: Sort) -> Document {
    match sort {
        Sort::CreatedAtAsc => doc! { "created_at": 1 },
    }
}

/// Durable store backed by MongoDB. One physical collection per consumer
/// group plus one DLQ sub-collection, created lazily on first write.
pub struct MongoStore {
    db: Database,
    dlq_suffix: String,
    dlq_ttl_minutes: Option<u64>,
    persistence_duration_minutes: u64,
}

impl MongoStore {
    /// Connects to `uri` and selects `database`.
    pub async fn connect(
        uri: &str,
        database: &str,
        dlq_suffix: impl Into<String>,
        persistence_duration_minutes: u64,
        dlq_ttl_minutes: Option<u64>,
    ) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await.map_err(classify)?;
        Ok(Self {
            db: client.database(database),
            dlq_suffix: dlq_suffix.into(),
            dlq_ttl_minutes,
            persistence_duration_minutes,
        })
    }

    fn live(&self, group: &ConsumerGroup) -> Collection<MongoMessage> {
        self.db.collection(group.as_str())
    }

    fn dlq(&self, group: &ConsumerGroup) -> Collection<MongoDlqEntry> {
        self.db.collection(&group.dlq_collection(&self.dlq_suffix))
    }
}

#[async_trait]
impl DurableStore for MongoStore {
    async fn ensure_indexes(&self, group: &ConsumerGroup) -> StoreResult<()> {
        let coll = self.live(group);

        let ttl = IndexModel::builder()
            .keys(doc! { "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Some(StdDuration::from_secs(self.persistence_duration_minutes * 60)))
                    .partial_filter_expression(Some(doc! { "consumed": true }))
                    .build(),
            )
            .build();

        let reservation = IndexModel::builder()
            .keys(doc! {
                "consumed": 1,
                "created_at": 1,
                "reserved_until": 1,
                "scheduled_at": 1,
            })
            .build();

        coll.create_indexes(vec![ttl, reservation]).await.map_err(classify)?;
        Ok(())
    }

    async fn insert(&self, group: &ConsumerGroup, msg: Message) -> StoreResult<()> {
        self.live(group)
            .insert_one(MongoMessage::from(msg))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_many(&self, group: &ConsumerGroup, msgs: Vec<Message>) -> StoreResult<()> {
        if msgs.is_empty() {
            return Ok(());
        }
        let docs: Vec<MongoMessage> = msgs.into_iter().map(MongoMessage::from).collect();
        self.live(group).insert_many(docs).await.map_err(classify)?;
        Ok(())
    }

    async fn find_by_id(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<Option<Message>> {
        let doc = self
            .live(group)
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(classify)?;
        match doc {
            Some(d) => d.into_message(group).map(Some).map_err(permanent_error),
            None => Ok(None),
        }
    }

    async fn update_if(&self, group: &ConsumerGroup, filter: Filter, update: Update) -> StoreResult<u64> {
        let result = self
            .live(group)
            .update_many(filter_to_doc(&filter), update_to_doc(&update))
            .await
            .map_err(classify)?;
        Ok(result.modified_count)
    }

    async fn find_and_modify(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        update: Update,
        sort: Option<Sort>,
        return_new: bool,
    ) -> StoreResult<Option<Message>> {
        let mut options = FindOneAndUpdateOptions::builder()
            .return_document(Some(if return_new {
                ReturnDocument::After
            } else {
                ReturnDocument::Before
            }))
            .build();
        options.sort = sort.map(sort_to_doc);

        let doc = self
            .live(group)
            .find_one_and_update(filter_to_doc(&filter), update_to_doc(&update))
            .with_options(options)
            .await
            .map_err(classify)?;

        match doc {
            Some(d) => d.into_message(group).map(Some).map_err(permanent_error),
            None => Ok(None),
        }
    }

    async fn find(
        &self,
        group: &ConsumerGroup,
        filter: Filter,
        sort: Option<Sort>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Message>> {
        use futures::stream::TryStreamExt;

        let mut find = self.live(group).find(filter_to_doc(&filter));
        if let Some(sort) = sort {
            find = find.sort(sort_to_doc(sort));
        }
        if let Some(limit) = limit {
            find = find.limit(limit as i64);
        }
        let docs: Vec<MongoMessage> = find.await.map_err(classify)?.try_collect().await.map_err(classify)?;
        docs.into_iter()
            .map(|d| d.into_message(group).map_err(permanent_error))
            .collect()
    }

    async fn remove(&self, group: &ConsumerGroup, filter: Filter) -> StoreResult<u64> {
        let result = self.live(group).delete_many(filter_to_doc(&filter)).await.map_err(classify)?;
        Ok(result.deleted_count)
    }

    async fn ensure_dlq_index(&self, group: &ConsumerGroup) -> StoreResult<()> {
        let Some(minutes) = self.dlq_ttl_minutes else {
            return Ok(());
        };
        if minutes == 0 {
            return Ok(());
        }
        let ttl = IndexModel::builder()
            .keys(doc! { "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Some(StdDuration::from_secs(minutes * 60)))
                    .build(),
            )
            .build();
        self.dlq(group).create_index(ttl).await.map_err(classify)?;
        Ok(())
    }

    async fn dlq_insert(&self, group: &ConsumerGroup, entry: DlqEntry) -> StoreResult<()> {
        self.dlq(group)
            .insert_one(MongoDlqEntry::from(entry))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn dlq_find_by_id(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<Option<DlqEntry>> {
        let doc = self
            .dlq(group)
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(classify)?;
        match doc {
            Some(d) => d.into_entry(group).map(Some).map_err(permanent_error),
            None => Ok(None),
        }
    }

    async fn dlq_view(&self, group: &ConsumerGroup, limit: usize) -> StoreResult<Vec<DlqEntry>> {
        use futures::stream::TryStreamExt;

        let docs: Vec<MongoDlqEntry> = self
            .dlq(group)
            .find(doc! {})
            .sort(doc! { "failed_at": -1 })
            .limit(limit as i64)
            .await
            .map_err(classify)?
            .try_collect()
            .await
            .map_err(classify)?;
        docs.into_iter()
            .map(|d| d.into_entry(group).map_err(permanent_error))
            .collect()
    }

    async fn dlq_remove(&self, group: &ConsumerGroup, id: MessageId) -> StoreResult<bool> {
        let result = self
            .dlq(group)
            .delete_one(doc! { "_id": id.to_string() })
            .await
            .map_err(classify)?;
        Ok(result.deleted_count > 0)
    }
}

fn permanent_error(msg: String) -> lightq_store::StoreError {
    lightq_store::StoreError::Permanent(Box::new(std::io::Error::other(msg)))
}
