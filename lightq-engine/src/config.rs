use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Write policy for [`crate::push::PushEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistencePolicy {
    /// Insert into the durable store synchronously before returning;
    /// durability is guaranteed on return. The default.
    WriteThrough,
    /// Add to the cache synchronously, then insert into the durable store
    /// on a bounded worker pool with retries. Callers accept weakened
    /// durability: a cache-only message is lost if it expires before the
    /// background insert lands.
    WriteBehind,
}

impl Default for PersistencePolicy {
    fn default() -> Self {
        Self::WriteThrough
    }
}

/// Closed set of engine-level tuning knobs.
/// Deserializable so it can be layered from file/env by `lightq-configuration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Max view/peek size. Default 50.
    pub message_allowed_to_fetch: usize,
    /// Live-record TTL, minutes. Default 30.
    pub persistence_duration_minutes: i64,
    /// Cache key TTL, minutes. Default 5.
    pub cache_ttl_minutes: i64,
    /// Per-group cache bound; overflow drops the newest-scored entries.
    /// Default 1000.
    pub cache_max_entries_per_group: usize,
    /// Reservation window, seconds. Default 30.
    pub visibility_timeout_seconds: i64,
    /// Delivery attempts allowed before DLQ triage. Default 5.
    pub max_delivery_attempts: u32,
    /// Suffix appended to a group name for its DLQ sub-collection. Default `-dlq`.
    pub dlq_suffix: String,
    /// DLQ TTL, minutes; `0` disables the TTL index. Default 0.
    pub dlq_ttl_minutes: i64,
    /// Write policy. Default write-through.
    pub persistence_policy: PersistencePolicy,
    /// Opts into `write-behind` together with `scheduledAt` pushes, which
    /// the source system could silently drop on cache expiry before the
    /// durable insert landed. Default `false` — such combinations are
    /// rejected as a validation error unless explicitly enabled.
    pub allow_async_scheduled: bool,
    /// Scheduled-promoter tick interval, milliseconds. Default 5000.
    pub scheduled_promoter_rate_ms: u64,
    /// Cap on promotions performed in a single promoter tick. Default 100.
    pub max_promotions_per_run: usize,
    /// Bound on the index-ensurance memoization LRU. Default 500.
    pub index_cache_max_groups: usize,
    /// Access-time expiry for the index-ensurance memo, minutes. Default 60.
    pub index_cache_expire_minutes: i64,
    /// Overall timeout applied to a single external call — a durable-store
    /// operation or a cache command — seconds. Default 2.
    pub cache_command_timeout_seconds: u64,
    /// Timeout allotted to drain the cache client on shutdown, seconds. Default 5.
    pub cache_shutdown_timeout_seconds: u64,
    /// Bounded worker pool sizing for write-behind persistence.
    pub worker_pool: WorkerPoolConfig,
}

impl Default for EngineConfig {
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
            persistence_policy: PersistencePolicy::WriteThrough,
            allow_async_scheduled: false,
            scheduled_promoter_rate_ms: 5_000,
            max_promotions_per_run: 100,
            index_cache_max_groups: 500,
            index_cache_expire_minutes: 60,
            cache_command_timeout_seconds: 2,
            cache_shutdown_timeout_seconds: 5,
            worker_pool: WorkerPoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// `visibility-timeout-seconds` as a [`chrono::Duration`].
    pub fn visibility_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.visibility_timeout_seconds)
    }

    /// `persistence-duration-minutes` as a [`chrono::Duration`].
    pub fn persistence_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.persistence_duration_minutes)
    }

    /// `cache-ttl-minutes` as a [`std::time::Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs((self.cache_ttl_minutes.max(0) as u64) * 60)
    }

    /// `index-cache-expire-minutes` as a [`std::time::Duration`].
    pub fn index_cache_expire(&self) -> Duration {
        Duration::from_secs((self.index_cache_expire_minutes.max(0) as u64) * 60)
    }

    /// `scheduled-promoter-rate-ms` as a [`std::time::Duration`].
    pub fn scheduled_promoter_rate(&self) -> Duration {
        Duration::from_millis(self.scheduled_promoter_rate_ms)
    }

    /// `cache-command-timeout-seconds` as a [`std::time::Duration`]. Bounds
    /// every individual durable-store and cache call the engine makes.
    pub fn cache_command_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_command_timeout_seconds)
    }

    /// `cache-shutdown-timeout-seconds` as a [`std::time::Duration`].
    pub fn cache_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_shutdown_timeout_seconds)
    }
}

/// Core/max/queue sizing for the bounded worker pool backing write-behind
/// persistence. On an async runtime, "core" workers are long-lived tasks
/// draining the queue and "max" is the total concurrency cap enforced by a
/// semaphore; see [`crate::worker_pool::WorkerPool`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkerPoolConfig {
    /// Long-lived workers draining the queue.
    pub core: usize,
    /// Total concurrent write-behind insert attempts allowed.
    pub max: usize,
    /// Bounded channel capacity; a full queue rejects new submissions and
    /// increments a counter rather than blocking the caller indefinitely.
    pub queue: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core: 5,
            max: 10,
            queue: 25,
        }
    }
}
