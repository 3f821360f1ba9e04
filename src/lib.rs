pub mod cache;
pub mod config;
pub mod connectivity;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod routes;
pub mod state;
pub mod sync;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::credentials::TokenSlot;
use crate::queue::ActionQueue;
use crate::state::{AppState, SharedState};
use crate::sync::{HttpTransport, SyncCoordinator, SyncExecutor, Transport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn build_app(pool: SqlitePool, config: Config) -> Result<(Router, SharedState), reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(config.sync.request_timeout)
        .build()?;
    let transport = Arc::new(HttpTransport::with_client(client.clone(), &config.upstream_url));

    let state = build_state(pool, config, client, transport);
    Ok((router(state.clone()), state))
}

/// Wire the queue, coordinator and cache layer around one database pool.
pub fn build_state(
    pool: SqlitePool,
    config: Config,
    client: reqwest::Client,
    transport: Arc<dyn Transport>,
) -> SharedState {
    // With a probe configured, start offline and let the first probe flip
    // us online; that edge replays anything left over from the last run.
    let connectivity = Arc::new(Connectivity::new(config.sync.probe_interval.is_none()));
    let credentials = Arc::new(TokenSlot::new(config.api_token.clone()));
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let executor = SyncExecutor::new(pool.clone(), transport, credentials.clone(), events.clone());
    let coordinator = Arc::new(SyncCoordinator::new(
        executor,
        connectivity.clone(),
        config.sync.tag.clone(),
    ));

    let queue = ActionQueue::new(
        pool.clone(),
        connectivity.clone(),
        coordinator.clone(),
        config.default_max_retries,
        config.sync.on_enqueue,
    );

    let cache = CacheLayer::new(pool.clone(), client, &config.upstream_url, &config.cache);

    Arc::new(AppState {
        pool,
        config,
        connectivity,
        credentials,
        coordinator,
        queue,
        cache,
        events,
    })
}

pub fn router(state: SharedState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .fallback(routes::proxy::forward)
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
