//! Domain model shared by every LightQ crate: the `Message` entity, the
//! DLQ shadow entity, consumer-group validation, and the typed error kind
//! that all store/cache/engine boundaries raise.

pub mod consumer_group;
pub mod dlq;
pub mod error;
pub mod message;

pub use consumer_group::{ConsumerGroup, ConsumerGroupError};
pub use dlq::DlqEntry;
pub use error::LightQError;
pub use message::{Message, MessageId};
