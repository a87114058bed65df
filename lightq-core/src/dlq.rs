use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consumer_group::ConsumerGroup;
use crate::message::{Message, MessageId};

/// Shadow entity living in a group's `<group><dlq-suffix>` sub-collection:
/// a terminal copy of a message that exceeded `max-delivery-attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: MessageId,
    pub content: Vec<u8>,
    pub consumer_group: ConsumerGroup,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
    pub delivery_count: u32,
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub dlq_reason: String,
}

impl DlqEntry {
    /// Mirrors a live message's fields and stamps the failure metadata.
    pub fn from_message(msg: &Message, failed_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            id: msg.id,
            content: msg.content.clone(),
            consumer_group: msg.consumer_group.clone(),
            created_at: msg.created_at,
            consumed: true,
            delivery_count: msg.delivery_count,
            last_delivery_at: msg.last_delivery_at,
            last_error: msg.last_error.clone(),
            failed_at,
            dlq_reason: reason.into(),
        }
    }

    /// Replay creates a brand-new live message with a fresh id: DLQ entries
    /// are never mutated back into the live collection in place.
    pub fn to_replayed_message(&self, now: DateTime<Utc>) -> Message {
        Message::new(self.consumer_group.clone(), self.content.clone(), now, None)
    }
}
