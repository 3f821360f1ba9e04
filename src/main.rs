use std::net::SocketAddr;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use loom_sync::config::Config;
use loom_sync::{connectivity, db, worker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting Loom sync agent (upstream {})", config.upstream_url);

    let pool = db::connect(&config.database_url).await?;
    tracing::info!("Action store ready, migrations applied");

    let addr = SocketAddr::new(config.host, config.port);
    let (app, state) = loom_sync::build_app(pool, config)?;

    // Install, then activate: fill the current static cache and drop old namespaces.
    state.cache.precache(&state.config.cache.precache).await;
    let purged = state.cache.activate().await;
    if purged > 0 {
        tracing::info!("Purged {purged} entries from old caches");
    }

    let pending = state.queue.pending_count().await?;
    if pending > 0 {
        tracing::info!("{pending} queued action(s) waiting for the next sync");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let wake = state
        .config
        .sync
        .interval
        .map(|period| (period, state.config.sync.tag.clone()));
    let trigger_loop = worker::spawn(
        state.coordinator.clone(),
        state.connectivity.clone(),
        wake,
        shutdown_rx.clone(),
    );

    let probe = match state.config.sync.probe_interval {
        Some(interval) => {
            let client = reqwest::Client::builder()
                .timeout(state.config.sync.request_timeout)
                .build()?;
            Some(connectivity::spawn_probe(
                state.connectivity.clone(),
                client,
                format!("{}/health", state.config.upstream_url),
                interval,
                shutdown_rx.clone(),
            ))
        }
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = trigger_loop.await;
    if let Some(probe) = probe {
        let _ = probe.await;
    }

    tracing::info!("Loom sync agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
