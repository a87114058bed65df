use thiserror::Error;

/// Error raised by a [`DurableStore`](crate::DurableStore) implementation.
///
/// Callers distinguish [`StoreError::Transient`] (worth retrying with
/// backoff) from
/// [`StoreError::Permanent`] (a programming or data error not worth
/// retrying).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network/connection-level failure against the backing store.
    /// Callers may retry with exponential backoff.
    #[error("durable store connection error: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Any other backend failure: serialization, invariant violation,
    /// malformed query. Not retried.
    #[error("durable store error: {0}")]
    Permanent(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// True when the bounded-retry policy should attempt this operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}
