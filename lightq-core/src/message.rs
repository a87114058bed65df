use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consumer_group::ConsumerGroup;

/// Largest payload LightQ will accept for a single message, in bytes.
pub const MAX_CONTENT_BYTES: usize = 1_048_576;

/// Opaque unique identifier for a message, stable across its lifetime
/// (ack/nack/extend all address a message by this id). DLQ replay always
/// mints a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The primary queue entity: a single payload flowing through a consumer
/// group's push -> reserve -> ack/nack/dlq lifecycle.
///
/// `consumed = true` is terminal: no transition in this crate is allowed to
/// flip it back to `false`. The durable store is always the source of
/// truth; the cache may disagree transiently but is reconciled against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub consumer_group: ConsumerGroup,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
    pub delivery_count: u32,
    pub reserved_until: Option<DateTime<Utc>>,
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Builds a freshly-created, never-delivered message.
    pub fn new(
        consumer_group: ConsumerGroup,
        content: Vec<u8>,
        created_at: DateTime<Utc>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            consumer_group,
            content,
            created_at,
            consumed: false,
            delivery_count: 0,
            reserved_until: None,
            last_delivery_at: None,
            last_error: None,
            scheduled_at,
        }
    }

    /// A message is reservable iff unconsumed, not currently leased, and
    /// (if scheduled) its schedule has elapsed.
    pub fn is_reservable(&self, now: DateTime<Utc>) -> bool {
        !self.consumed
            && self.reserved_until.is_none_or(|ru| ru <= now)
            && self.scheduled_at.is_none_or(|sa| sa <= now)
    }

    /// `None` iff the message is currently available; if a schedule or
    /// lease is still in the future, the caller is holding a stale view.
    pub fn is_future_scheduled(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_some_and(|sa| sa > now)
    }
}

/// Validates content against the non-empty / max-size invariant.
pub fn validate_content(content: &[u8]) -> Result<(), ContentError> {
    if content.is_empty() {
        Err(ContentError::Empty)
    } else if content.len() > MAX_CONTENT_BYTES {
        Err(ContentError::TooLarge(content.len()))
    } else {
        Ok(())
    }
}

/// Error returned when message content fails validation.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("message content must not be empty")]
    Empty,
    #[error("message content of {0} bytes exceeds the {MAX_CONTENT_BYTES} byte limit")]
    TooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn group() -> ConsumerGroup {
        ConsumerGroup::parse("g").unwrap()
    }

    #[test]
    fn new_message_is_reservable_immediately() {
        let now = Utc::now();
        let msg = Message::new(group(), b"hi".to_vec(), now, None);
        assert!(msg.is_reservable(now));
        assert_eq!(msg.delivery_count, 0);
        assert!(!msg.consumed);
    }

    #[test]
    fn scheduled_message_is_not_reservable_before_due() {
        let now = Utc::now();
        let due = now + Duration::seconds(10);
        let msg = Message::new(group(), b"hi".to_vec(), now, Some(due));
        assert!(!msg.is_reservable(now));
        assert!(msg.is_reservable(due));
    }

    #[test]
    fn reserved_message_is_not_reservable_until_lease_elapses() {
        let now = Utc::now();
        let mut msg = Message::new(group(), b"hi".to_vec(), now, None);
        msg.reserved_until = Some(now + Duration::seconds(5));
        assert!(!msg.is_reservable(now));
        assert!(msg.is_reservable(now + Duration::seconds(6)));
    }

    #[test]
    fn consumed_message_is_never_reservable() {
        let now = Utc::now();
        let mut msg = Message::new(group(), b"hi".to_vec(), now, None);
        msg.consumed = true;
        assert!(!msg.is_reservable(now));
    }

    #[test]
    fn content_validation_rejects_empty_and_oversized() {
        assert!(validate_content(b"").is_err());
        assert!(validate_content(b"ok").is_ok());
        assert!(validate_content(&vec![0u8; MAX_CONTENT_BYTES + 1]).is_err());
        assert!(validate_content(&vec![0u8; MAX_CONTENT_BYTES]).is_ok());
    }
}
