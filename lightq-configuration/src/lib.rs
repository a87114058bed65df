//! Layered configuration loading (CLI > environment > file > defaults) and
//! backend factory functions turning a [`Settings`] into the durable store,
//! cache store, and [`lightq_engine::EngineConfig`] the HTTP adapter wires
//! into an [`lightq_engine::Engine`].

pub mod backend;
pub mod error;
pub mod settings;

pub use backend::{build_cache_store, build_durable_store};
pub use error::ConfigError;
pub use settings::{CacheStoreSettings, Cli, DurableStoreSettings, HttpSettings, Settings};
