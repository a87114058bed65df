//! Shared fixtures for the scenario tests under `tests/`: an in-memory
//! engine and router builder so each scenario only has to describe the
//! configuration it actually varies.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use lightq_cache_memory::MemoryCache;
use lightq_engine::{Engine, EngineConfig};
use lightq_http::{AppState, GroupRegistry, router};
use lightq_store_memory::MemoryStore;

/// Builds a [`TestServer`] over a fresh in-memory engine configured by
/// `configure`. Each scenario gets its own store and cache, so tests never
/// interfere with one another even run in parallel.
pub fn test_server(configure: impl FnOnce(&mut EngineConfig)) -> TestServer {
    let mut config = EngineConfig::default();
    configure(&mut config);

    let cache = MemoryCache::new(config.cache_ttl(), config.cache_max_entries_per_group);
    let engine = Arc::new(Engine::new(Arc::new(MemoryStore::new()), Arc::new(cache), config));
    let state = AppState {
        engine,
        groups: GroupRegistry::new(),
    };
    let app = router(state, Duration::from_secs(5));
    TestServer::new(app).expect("failed to build test server")
}
