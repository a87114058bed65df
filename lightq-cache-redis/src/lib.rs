//! Redis-backed [`lightq_cache::CacheStore`] implementation (component C2).
//! Uses a sorted set plus companion hash per consumer group, pipelined
//! writes, and a lazily-established [`redis::aio::ConnectionManager`].

mod backend;
mod error;

pub use backend::{RedisCache, RedisCacheBuilder};
pub use error::Error;
