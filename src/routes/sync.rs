use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::state::SharedState;
use crate::sync::{SyncOutcome, SyncTrigger};

#[derive(Deserialize)]
pub struct WakeRequest {
    pub tag: String,
}

#[derive(Deserialize)]
pub struct ConnectivityUpdate {
    pub online: bool,
}

#[derive(Deserialize)]
pub struct CredentialsUpdate {
    pub token: String,
}

pub async fn sync_now(State(state): State<SharedState>) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state.queue.sync_now().await?;
    Ok(Json(outcome))
}

/// Background wake from an external scheduler.
pub async fn wake(
    State(state): State<SharedState>,
    Json(req): Json<WakeRequest>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state
        .coordinator
        .trigger(SyncTrigger::BackgroundWake { tag: req.tag })
        .await?;
    Ok(Json(outcome))
}

pub async fn set_connectivity(
    State(state): State<SharedState>,
    Json(req): Json<ConnectivityUpdate>,
) -> Json<serde_json::Value> {
    let changed = state.connectivity.set_online(req.online);
    Json(json!({ "online": state.connectivity.is_online(), "changed": changed }))
}

pub async fn set_credentials(
    State(state): State<SharedState>,
    Json(req): Json<CredentialsUpdate>,
) -> Result<StatusCode, AppError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }
    state.credentials.set(token.to_string()).await;
    tracing::debug!("Bearer token updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_credentials(State(state): State<SharedState>) -> StatusCode {
    state.credentials.clear().await;
    tracing::debug!("Bearer token cleared");
    StatusCode::NO_CONTENT
}
