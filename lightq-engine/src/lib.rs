//! The LightQ queueing engine: the two-tier store orchestration, the
//! atomic reservation/ack state machine, the DLQ pipeline, the scheduled
//! promoter, and the admin view. Everything in this crate is generic over
//! [`lightq_store::DurableStore`] and [`lightq_cache::CacheStore`]
//! implementations supplied by the caller — concrete backends (MongoDB,
//! Redis, in-memory) live in sibling crates.

pub mod admin;
pub mod ack;
pub mod config;
pub mod dlq;
pub mod engine;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod promoter;
pub mod push;
pub mod reservation;
pub mod retry;
pub mod worker_pool;

pub use admin::ConsumedFilter;
pub use config::{EngineConfig, PersistencePolicy, WorkerPoolConfig};
pub use engine::Engine;
