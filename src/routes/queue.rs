use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ActionType, QueuedAction};
use crate::state::SharedState;
use crate::sync::{PassReport, SyncState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub event_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub max_retries: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending: i64,
    pub online: bool,
    pub syncing: bool,
    pub state: SyncState,
    pub last_pass: Option<PassReport>,
}

pub async fn enqueue(
    State(state): State<SharedState>,
    Json(req): Json<EnqueueAction>,
) -> Result<(StatusCode, Json<QueuedAction>), AppError> {
    if req.event_id.trim().is_empty() {
        return Err(AppError::BadRequest("eventId is required".to_string()));
    }
    if req.max_retries.is_some_and(|n| n < 0) {
        return Err(AppError::BadRequest("maxRetries must not be negative".to_string()));
    }

    let action = state
        .queue
        .enqueue(req.action_type, &req.event_id, req.data, req.max_retries)
        .await?;

    Ok((StatusCode::CREATED, Json(action)))
}

pub async fn list(State(state): State<SharedState>) -> Result<Json<Vec<QueuedAction>>, AppError> {
    let actions = state.queue.list().await?;
    Ok(Json(actions))
}

pub async fn remove(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.queue.remove(id).await? {
        tracing::info!("Discarded queued action {id}");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn status(State(state): State<SharedState>) -> Result<Json<QueueStatus>, AppError> {
    let pending = state.queue.pending_count().await?;

    Ok(Json(QueueStatus {
        pending,
        online: state.queue.is_online(),
        syncing: state.coordinator.is_syncing(),
        state: state.coordinator.state(),
        last_pass: state.coordinator.last_report().await,
    }))
}
