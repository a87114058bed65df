use thiserror::Error;

use crate::wire::WireError;

/// Error raised by a [`crate::CacheStore`] implementation.
///
/// Callers normally never observe this directly: [`crate::CircuitBreakerCache`]
/// swallows it into a degraded no-op/empty-result response and trips the
/// breaker: cache failure is never fatal to a caller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Connection or protocol failure against the backing cache.
    #[error("cache connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Wire (de)serialization failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}
