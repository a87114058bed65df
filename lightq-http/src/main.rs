//! `lightq` server binary: loads configuration, wires the durable/cache
//! stores into an [`lightq_engine::Engine`], and serves the `/queue/*`
//! router. Also owns the scheduled-promoter sweep, since the engine's own
//! [`lightq_engine::Engine::spawn_promoter`] needs a static group list and
//! this process only learns of consumer groups as they're pushed to.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lightq_configuration::{Cli, build_cache_store, build_durable_store, load};
use lightq_http::{AppState, GroupRegistry, router};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt().pretty().with_env_filter(cli.log_filter.clone()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let settings = load(&cli).expect("failed to load configuration");

    let durable_store = build_durable_store(&settings).await.expect("failed to connect durable store");
    let cache_store = build_cache_store(&settings).expect("failed to build cache store");
    let engine = Arc::new(lightq_engine::Engine::new(durable_store, cache_store, settings.to_engine_config()));

    let groups = GroupRegistry::new();
    spawn_promoter_sweep(engine.clone(), groups.clone(), settings.scheduled_promoter_rate_ms);

    let shutdown_engine = engine.clone();
    let state = AppState { engine, groups };
    let request_timeout = Duration::from_secs(settings.http.request_timeout_seconds);
    let app = router(state, request_timeout);

    let listener = tokio::net::TcpListener::bind(&settings.http.bind_address)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", settings.http.bind_address));
    info!("listening on http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    shutdown_engine.shutdown().await;
}

/// Periodically sweeps every group [`GroupRegistry`] has observed, promoting
/// due scheduled messages in each. Ticks at the same rate
/// [`lightq_engine::Engine::spawn_promoter`] would, but over a group list
/// that grows as pushes arrive rather than one fixed at startup.
fn spawn_promoter_sweep(engine: Arc<lightq_engine::Engine>, groups: GroupRegistry, rate_ms: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(rate_ms));
        loop {
            ticker.tick().await;
            for group in groups.snapshot() {
                match engine.promote_due(&group).await {
                    Ok(count) if count > 0 => debug!(group = group.as_str(), count, "promoted scheduled messages"),
                    Ok(_) => {}
                    Err(e) => warn!(group = group.as_str(), error = %e, "scheduled promotion tick failed"),
                }
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
