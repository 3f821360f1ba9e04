pub mod proxy;
pub mod queue;
pub mod sync;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Queue
        .route("/loom/v1/queue", get(queue::list).post(queue::enqueue))
        .route("/loom/v1/queue/{id}", delete(queue::remove))
        .route("/loom/v1/status", get(queue::status))
        // Sync
        .route("/loom/v1/sync", post(sync::sync_now))
        .route("/loom/v1/sync/wake", post(sync::wake))
        .route("/loom/v1/connectivity", put(sync::set_connectivity))
        .route(
            "/loom/v1/credentials",
            put(sync::set_credentials).delete(sync::clear_credentials),
        )
}
