//! Cache-store trait (component C2 of the LightQ engine): a per-group
//! scored set keyed by message identity, fronting the durable store. The
//! durable store is always authoritative; the cache may be stale but is
//! reconciled, not trusted, by the reservation engine.
//!
//! Concrete backends (Redis, in-memory) live in sibling crates and
//! implement [`CacheStore`]. [`circuit_breaker::CircuitBreakerCache`] wraps
//! any backend so callers never see a cache failure as fatal.

pub mod backend;
pub mod circuit_breaker;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod wire;

pub use backend::{CacheResult, CacheStore};
pub use circuit_breaker::{CircuitBreakerCache, CircuitBreakerConfig, CircuitState};
pub use error::CacheError;
