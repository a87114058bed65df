//! Fixed binary schema for a cached [`Message`], independent of the
//! in-process struct layout. Wire bytes round-trip losslessly and carry no
//! Rust type identifiers — only the fields below, in this order.

use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use lightq_core::{ConsumerGroup, Message, MessageId};

const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

#[derive(Debug, Encode, Decode)]
struct WireMessage {
    id: [u8; 16],
    content: Vec<u8>,
    created_at_millis: i64,
    consumed: bool,
    delivery_count: u32,
    reserved_until_millis: Option<i64>,
    last_delivery_at_millis: Option<i64>,
    last_error: Option<String>,
    scheduled_at_millis: Option<i64>,
}

/// Error returned when encoding or decoding a cache wire payload fails.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode cache payload: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode cache payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("cache payload carried an out-of-range timestamp")]
    BadTimestamp,
}

fn millis_to_dt(millis: i64) -> Result<DateTime<Utc>, WireError> {
    DateTime::from_timestamp_millis(millis).ok_or(WireError::BadTimestamp)
}

/// Encodes `msg` into the fixed-schema wire payload. Deterministic for a
/// given set of field values, so retried pushes of an identical message
/// produce byte-identical members in the backing scored set.
pub fn encode(msg: &Message) -> Result<Vec<u8>, WireError> {
    let wire = WireMessage {
        id: *msg.id.0.as_bytes(),
        content: msg.content.clone(),
        created_at_millis: msg.created_at.timestamp_millis(),
        consumed: msg.consumed,
        delivery_count: msg.delivery_count,
        reserved_until_millis: msg.reserved_until.map(|t| t.timestamp_millis()),
        last_delivery_at_millis: msg.last_delivery_at.map(|t| t.timestamp_millis()),
        last_error: msg.last_error.clone(),
        scheduled_at_millis: msg.scheduled_at.map(|t| t.timestamp_millis()),
    };
    Ok(bincode::encode_to_vec(&wire, BINCODE_CONFIG)?)
}

/// Decodes a wire payload back into a [`Message`] owned by `group`.
pub fn decode(bytes: &[u8], group: &ConsumerGroup) -> Result<Message, WireError> {
    let (wire, _): (WireMessage, usize) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;
    Ok(Message {
        id: MessageId(Uuid::from_bytes(wire.id)),
        consumer_group: group.clone(),
        content: wire.content,
        created_at: millis_to_dt(wire.created_at_millis)?,
        consumed: wire.consumed,
        delivery_count: wire.delivery_count,
        reserved_until: wire.reserved_until_millis.map(millis_to_dt).transpose()?,
        last_delivery_at: wire.last_delivery_at_millis.map(millis_to_dt).transpose()?,
        last_error: wire.last_error,
        scheduled_at: wire.scheduled_at_millis.map(millis_to_dt).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn group() -> ConsumerGroup {
        ConsumerGroup::parse("g").unwrap()
    }

    #[test]
    fn round_trips_losslessly() {
        let now = Utc::now();
        let mut msg = Message::new(group(), b"payload".to_vec(), now, Some(now + Duration::seconds(5)));
        msg.delivery_count = 3;
        msg.reserved_until = Some(now + Duration::seconds(30));
        msg.last_delivery_at = Some(now);
        msg.last_error = Some("boom".to_string());

        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes, &group()).unwrap();

        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.content, msg.content);
        assert_eq!(decoded.delivery_count, msg.delivery_count);
        assert_eq!(decoded.last_error, msg.last_error);
        assert_eq!(decoded.created_at.timestamp_millis(), msg.created_at.timestamp_millis());
        assert_eq!(
            decoded.reserved_until.unwrap().timestamp_millis(),
            msg.reserved_until.unwrap().timestamp_millis()
        );
    }

    #[test]
    fn identical_messages_encode_identically() {
        let now = Utc::now();
        let mut msg = Message::new(group(), b"payload".to_vec(), now, None);
        msg.id = MessageId(Uuid::nil());
        let a = encode(&msg).unwrap();
        let b = encode(&msg).unwrap();
        assert_eq!(a, b, "retried pushes of the same message must be byte-identical");
    }
}
