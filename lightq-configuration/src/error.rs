use thiserror::Error;

/// Failures that can occur while loading settings or wiring backends from
/// them. Distinct from [`lightq_core::LightQError`]: this crate's errors
/// only ever happen at process start-up, before any request is served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to connect durable store backend: {0}")]
    DurableStore(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to build cache store backend: {0}")]
    CacheStore(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid bind address {0:?}: {1}")]
    BindAddress(String, std::net::AddrParseError),
}
