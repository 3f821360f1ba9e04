use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::broadcast;

use super::request::{DeliveryRequest, MappingError};
use super::transport::Transport;
use super::{DropReason, PassReport, SyncEvent, SyncTrigger};
use crate::credentials::CredentialSource;
use crate::db;
use crate::error::StoreError;
use crate::models::{ActionPatch, QueuedAction};

/// How a single delivery attempt ended.
#[derive(Debug)]
enum Attempt {
    Delivered,
    /// 404: the target is already gone, so the intent is satisfied.
    Conflict,
    Failed(String),
    Defect(MappingError),
}

pub struct SyncExecutor {
    pool: SqlitePool,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncExecutor {
    pub fn new(
        pool: SqlitePool,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        Self {
            pool,
            transport,
            credentials,
            events,
        }
    }

    /// Drain a snapshot of the queue. Only a failure to read the snapshot is
    /// returned as an error; per-action failures are recorded on the action.
    /// Actions enqueued after the snapshot wait for the next pass.
    pub async fn run_pass(&self, trigger: SyncTrigger) -> Result<PassReport, StoreError> {
        let snapshot = db::action_queue::list(&self.pool).await?;
        let mut report = PassReport::new(trigger.clone());

        if snapshot.is_empty() {
            tracing::debug!("Sync pass ({trigger}): queue empty");
            return Ok(report);
        }

        tracing::info!("Sync pass ({trigger}): {} queued action(s)", snapshot.len());
        self.emit(SyncEvent::PassStarted {
            trigger,
            queued: snapshot.len(),
        });

        for (index, action) in snapshot.iter().enumerate() {
            let Some(token) = self.credentials.bearer_token().await else {
                let remaining = snapshot.len() - index;
                tracing::warn!("No auth token available, aborting sync pass ({remaining} left queued)");
                report.aborted = true;
                self.emit(SyncEvent::PassAborted { remaining });
                break;
            };

            report.attempted += 1;
            let attempt = self.attempt(action, &token).await;
            if let Err(e) = self.settle(action, attempt, &mut report).await {
                // The action keeps its stored state and is retried next pass.
                tracing::error!("Failed to record outcome for action {}: {e}", action.id);
            }
        }

        tracing::info!(
            "Sync pass finished: {} delivered, {} conflicts, {} retried, {} dropped{}",
            report.delivered,
            report.conflicts,
            report.retried,
            report.dropped,
            if report.aborted { " (aborted)" } else { "" },
        );
        self.emit(SyncEvent::PassFinished {
            report: report.clone(),
        });

        Ok(report)
    }

    async fn attempt(&self, action: &QueuedAction, token: &str) -> Attempt {
        let request = match DeliveryRequest::for_action(action) {
            Ok(request) => request,
            Err(e) => return Attempt::Defect(e),
        };

        tracing::debug!(
            "Replaying action {} ({}, attempt {})",
            action.id,
            action.action_type,
            action.retry_count + 1
        );

        match self.transport.send(&request, token).await {
            Ok(status) if (200..300).contains(&status) => Attempt::Delivered,
            Ok(404) => Attempt::Conflict,
            Ok(status) => Attempt::Failed(format!("backend answered {status}")),
            Err(e) => Attempt::Failed(e.message),
        }
    }

    async fn settle(
        &self,
        action: &QueuedAction,
        attempt: Attempt,
        report: &mut PassReport,
    ) -> Result<(), StoreError> {
        match attempt {
            Attempt::Delivered => {
                db::action_queue::remove(&self.pool, action.id).await?;
                report.delivered += 1;
                self.emit(SyncEvent::Delivered { id: action.id });
            }
            Attempt::Conflict => {
                db::action_queue::remove(&self.pool, action.id).await?;
                report.conflicts += 1;
                tracing::info!(
                    "Action {} ({}) target already gone, treating as delivered",
                    action.id,
                    action.action_type
                );
                self.emit(SyncEvent::ConflictResolved { id: action.id });
            }
            Attempt::Failed(error) if action.can_retry() => {
                let retry_count = action.retry_count + 1;
                match db::action_queue::update(
                    &self.pool,
                    action.id,
                    &ActionPatch::retry_count(retry_count),
                )
                .await
                {
                    Ok(_) => {}
                    Err(StoreError::NotFound(_)) => {
                        tracing::debug!("Action {} removed during pass", action.id);
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
                report.retried += 1;
                tracing::info!(
                    "Action {} failed ({error}), retry {retry_count}/{}",
                    action.id,
                    action.max_retries
                );
                self.emit(SyncEvent::RetryScheduled {
                    id: action.id,
                    retry_count,
                    max_retries: action.max_retries,
                });
            }
            Attempt::Failed(error) => {
                let queued_since = action
                    .created_at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| action.timestamp.to_string());
                tracing::warn!(
                    "Dropping action {} ({}, queued {queued_since}) after {} attempts: {error}",
                    action.id,
                    action.action_type,
                    action.retry_count + 1
                );
                self.drop_action(action, DropReason::RetriesExhausted, report)
                    .await?;
            }
            Attempt::Defect(e) => {
                tracing::warn!("Dropping action {}: {e}", action.id);
                let reason = match e {
                    MappingError::UnknownType(_) => DropReason::UnknownType,
                    MappingError::MissingField { .. } => DropReason::MalformedPayload,
                };
                self.drop_action(action, reason, report).await?;
            }
        }
        Ok(())
    }

    async fn drop_action(
        &self,
        action: &QueuedAction,
        reason: DropReason,
        report: &mut PassReport,
    ) -> Result<(), StoreError> {
        if !db::action_queue::remove(&self.pool, action.id).await? {
            tracing::debug!("Action {} removed during pass", action.id);
            return Ok(());
        }
        report.dropped += 1;
        self.emit(SyncEvent::Dropped {
            id: action.id,
            action_type: action.action_type.clone(),
            reason,
        });
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
