use thiserror::Error;

use crate::consumer_group::ConsumerGroupError;
use crate::message::ContentError;

/// Typed error raised at the core's API boundary. Every adapter (HTTP,
/// admin tooling, future gRPC) maps these kinds to its own wire format;
/// nothing above this boundary should need to inspect a backend-specific
/// error type directly.
#[derive(Debug, Error)]
pub enum LightQError {
    /// Bad input caught before any side effect: invalid group name, empty
    /// or oversized content, bad enum value. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The addressed message (or DLQ entry) does not exist, or does not
    /// exist in the state the caller assumed (e.g. ack on a message that
    /// was never reserved in a way that would fail, not this variant).
    #[error("not found")]
    NotFound,

    /// The durable store failed after exhausting its bounded retry policy.
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An internal invariant was violated; should never be caused by
    /// caller input. Surfaced as a 500-class error by adapters.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ConsumerGroupError> for LightQError {
    fn from(e: ConsumerGroupError) -> Self {
        LightQError::Validation(e.to_string())
    }
}

impl From<ContentError> for LightQError {
    fn from(e: ContentError) -> Self {
        LightQError::Validation(e.to_string())
    }
}
