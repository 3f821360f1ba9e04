use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::connectivity::Connectivity;
use crate::db;
use crate::error::StoreError;
use crate::models::{ActionType, QueuedAction};
use crate::sync::{SyncCoordinator, SyncOutcome, SyncTrigger};

/// The application-facing side of the offline queue.
pub struct ActionQueue {
    pool: SqlitePool,
    connectivity: Arc<Connectivity>,
    coordinator: Arc<SyncCoordinator>,
    default_max_retries: i32,
    sync_on_enqueue: bool,
}

impl ActionQueue {
    pub fn new(
        pool: SqlitePool,
        connectivity: Arc<Connectivity>,
        coordinator: Arc<SyncCoordinator>,
        default_max_retries: i32,
        sync_on_enqueue: bool,
    ) -> Self {
        Self {
            pool,
            connectivity,
            coordinator,
            default_max_retries,
            sync_on_enqueue,
        }
    }

    /// Persist a new action and return it. Never waits on the network: when
    /// online, a best-effort pass is started on a separate task.
    pub async fn enqueue(
        &self,
        action_type: ActionType,
        event_id: &str,
        data: serde_json::Value,
        max_retries: Option<i32>,
    ) -> Result<QueuedAction, StoreError> {
        let action = QueuedAction {
            id: Uuid::now_v7(),
            action_type: action_type.as_str().to_string(),
            event_id: event_id.to_string(),
            data,
            timestamp: Utc::now().timestamp_millis(),
            retry_count: 0,
            max_retries: max_retries.unwrap_or(self.default_max_retries).max(0),
        };

        db::action_queue::insert(&self.pool, &action).await?;
        tracing::debug!("Queued action {} ({action_type}) for event {event_id}", action.id);

        if self.sync_on_enqueue && self.connectivity.is_online() {
            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = coordinator.trigger(SyncTrigger::Manual).await {
                    tracing::error!("Sync after enqueue failed: {e}");
                }
            });
        }

        Ok(action)
    }

    pub async fn pending_count(&self) -> Result<i64, StoreError> {
        db::action_queue::count(&self.pool).await
    }

    pub async fn list(&self) -> Result<Vec<QueuedAction>, StoreError> {
        db::action_queue::list(&self.pool).await
    }

    /// Discard a queued action; returns whether it was still queued.
    pub async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        db::action_queue::remove(&self.pool, id).await
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Run a pass now, or report that one is already running.
    pub async fn sync_now(&self) -> Result<SyncOutcome, StoreError> {
        self.coordinator.trigger(SyncTrigger::Manual).await
    }
}
