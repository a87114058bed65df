//! Redis-specific errors, converted to [`lightq_cache::CacheError`] at the
//! trait boundary.

use lightq_cache::CacheError;
use redis::RedisError;

/// Error type for Redis cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client: connection failures,
    /// protocol errors, or command execution errors.
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),
}

impl From<Error> for CacheError {
    fn from(error: Error) -> Self {
        CacheError::Connection(Box::new(error))
    }
}
