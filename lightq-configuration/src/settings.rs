use std::path::PathBuf;

use clap::Parser;
use lightq_engine::{PersistencePolicy, WorkerPoolConfig};
use serde::Deserialize;

use crate::error::ConfigError;

/// Command-line entry point for the `lightq-http` server binary. A config
/// file and environment variables (prefix `LIGHTQ__`) fill in everything
/// this doesn't override; see [`load`].
#[derive(Parser, Debug)]
#[command(name = "lightq", version, about = "LightQ message queue server")]
pub struct Cli {
    /// Path to a TOML/YAML/JSON settings file. Optional: `lightq.toml` in
    /// the working directory is used if present and this is omitted.
    #[arg(long, env = "LIGHTQ_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Overrides `http.bind-address`.
    #[arg(long, env = "LIGHTQ_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// `tracing_subscriber::EnvFilter` directive string.
    #[arg(long, env = "LIGHTQ_LOG_FILTER", default_value = "info,lightq=debug")]
    pub log_filter: String,
}

/// Durable-store backend selection. `Memory` is for local development and
/// tests; `Mongo` is the production backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum DurableStoreSettings {
    Mongo { uri: String, database: String },
    Memory,
}

impl Default for DurableStoreSettings {
    fn default() -> Self {
        Self::Memory
    }
}

/// Cache-store backend selection, mirroring [`DurableStoreSettings`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum CacheStoreSettings {
    Redis { server: String },
    Memory,
}

impl Default for CacheStoreSettings {
    fn default() -> Self {
        Self::Memory
    }
}

/// HTTP adapter settings outside the core engine's configuration surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpSettings {
    pub bind_address: String,
    pub request_timeout_seconds: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_owned(),
            request_timeout_seconds: 30,
        }
    }
}

/// The closed engine configuration surface, plus the ambient backend
/// selection and HTTP settings the engine itself has no opinion on.
/// Deserializable from a layered `config` source: defaults, then an
/// optional file, then `LIGHTQ__`-prefixed environment variables, then a
/// handful of CLI overrides applied in [`load`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub message_allowed_to_fetch: usize,
    pub persistence_duration_minutes: i64,
    pub cache_ttl_minutes: i64,
    pub cache_max_entries_per_group: usize,
    pub visibility_timeout_seconds: i64,
    pub max_delivery_attempts: u32,
    pub dlq_suffix: String,
    pub dlq_ttl_minutes: i64,
    /// `async-persistence`; `true` selects write-behind.
    pub async_persistence: bool,
    pub allow_async_scheduled: bool,
    pub scheduled_promoter_rate_ms: u64,
    pub max_promotions_per_run: usize,
    pub index_cache_max_groups: usize,
    pub index_cache_expire_minutes: i64,
    pub redis_command_timeout_seconds: u64,
    pub redis_shutdown_timeout_seconds: u64,
    pub worker_pool: WorkerPoolConfig,
    pub durable_store: DurableStoreSettings,
    pub cache_store: CacheStoreSettings,
    pub http: HttpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            message_allowed_to_fetch: 50,
            persistence_duration_minutes: 30,
            cache_ttl_minutes: 5,
            cache_max_entries_per_group: 1000,
            visibility_timeout_seconds: 30,
            max_delivery_attempts: 5,
            dlq_suffix: "-dlq".to_owned(),
            dlq_ttl_minutes: 0,
            async_persistence: false,
            allow_async_scheduled: false,
            scheduled_promoter_rate_ms: 5_000,
            max_promotions_per_run: 100,
            index_cache_max_groups: 500,
            index_cache_expire_minutes: 60,
            redis_command_timeout_seconds: 2,
            redis_shutdown_timeout_seconds: 5,
            worker_pool: WorkerPoolConfig::default(),
            durable_store: DurableStoreSettings::default(),
            cache_store: CacheStoreSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl Settings {
    /// Converts the closed configuration surface into the engine's runtime
    /// config. Backend selection and HTTP settings stay in [`Settings`]
    /// since [`lightq_engine::EngineConfig`] is backend-agnostic.
    pub fn to_engine_config(&self) -> lightq_engine::EngineConfig {
        lightq_engine::EngineConfig {
            message_allowed_to_fetch: self.message_allowed_to_fetch,
            persistence_duration_minutes: self.persistence_duration_minutes,
            cache_ttl_minutes: self.cache_ttl_minutes,
            cache_max_entries_per_group: self.cache_max_entries_per_group,
            visibility_timeout_seconds: self.visibility_timeout_seconds,
            max_delivery_attempts: self.max_delivery_attempts,
            dlq_suffix: self.dlq_suffix.clone(),
            dlq_ttl_minutes: self.dlq_ttl_minutes,
            persistence_policy: if self.async_persistence {
                PersistencePolicy::WriteBehind
            } else {
                PersistencePolicy::WriteThrough
            },
            allow_async_scheduled: self.allow_async_scheduled,
            scheduled_promoter_rate_ms: self.scheduled_promoter_rate_ms,
            max_promotions_per_run: self.max_promotions_per_run,
            index_cache_max_groups: self.index_cache_max_groups,
            index_cache_expire_minutes: self.index_cache_expire_minutes,
            cache_command_timeout_seconds: self.redis_command_timeout_seconds,
            cache_shutdown_timeout_seconds: self.redis_shutdown_timeout_seconds,
            worker_pool: self.worker_pool,
        }
    }
}

/// Loads settings layered defaults < file < environment, then applies the
/// narrow set of CLI overrides `Cli` exposes directly.
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();
    builder = match &cli.config {
        Some(path) => builder.add_source(config::File::from(path.clone())),
        None => builder.add_source(config::File::with_name("lightq").required(false)),
    };
    builder = builder.add_source(config::Environment::with_prefix("LIGHTQ").separator("__"));

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    if let Some(bind_address) = &cli.bind_address {
        settings.http.bind_address = bind_address.clone();
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_closed_configuration_set() {
        let settings = Settings::default();
        assert_eq!(settings.message_allowed_to_fetch, 50);
        assert_eq!(settings.visibility_timeout_seconds, 30);
        assert_eq!(settings.max_delivery_attempts, 5);
        assert_eq!(settings.dlq_suffix, "-dlq");
        assert!(matches!(settings.durable_store, DurableStoreSettings::Memory));
        assert!(matches!(settings.cache_store, CacheStoreSettings::Memory));
    }

    #[test]
    fn engine_config_reflects_async_persistence_toggle() {
        let mut settings = Settings::default();
        settings.async_persistence = true;
        let engine_config = settings.to_engine_config();
        assert_eq!(engine_config.persistence_policy, PersistencePolicy::WriteBehind);
    }

    #[test]
    fn cli_bind_address_overrides_settings() {
        let cli = Cli {
            config: None,
            bind_address: Some("127.0.0.1:9000".to_owned()),
            log_filter: "info".to_owned(),
        };
        // load() reads the process environment and an optional `lightq.*`
        // file from the working directory; neither is expected to exist in
        // a test run, so the override is the only thing that should apply.
        let settings = load(&cli).unwrap();
        assert_eq!(settings.http.bind_address, "127.0.0.1:9000");
    }
}
