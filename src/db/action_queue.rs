//! Durable action store.
//!
//! Every operation is a single SQL statement, so each insert, merge and
//! delete is atomic with respect to concurrent readers.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{ActionPatch, QueuedAction};

const COLUMNS: &str = "id, action_type, event_id, data, timestamp, retry_count, max_retries";

pub async fn insert(pool: &SqlitePool, action: &QueuedAction) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO queued_actions (id, action_type, event_id, data, timestamp, retry_count, max_retries)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(action.id)
    .bind(&action.action_type)
    .bind(&action.event_id)
    .bind(&action.data)
    .bind(action.timestamp)
    .bind(action.retry_count)
    .bind(action.max_retries)
    .execute(pool)
    .await?;
    Ok(())
}

/// All committed actions in replay order: oldest timestamp first, ties by insertion.
pub async fn list(pool: &SqlitePool) -> Result<Vec<QueuedAction>, StoreError> {
    let actions = sqlx::query_as::<_, QueuedAction>(&format!(
        "SELECT {COLUMNS} FROM queued_actions ORDER BY timestamp ASC, seq ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(actions)
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<QueuedAction>, StoreError> {
    let action = sqlx::query_as::<_, QueuedAction>(&format!(
        "SELECT {COLUMNS} FROM queued_actions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(action)
}

pub async fn count(pool: &SqlitePool) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queued_actions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete an action. Returns whether a row was removed; an absent id is not an error.
pub async fn remove(pool: &SqlitePool, id: Uuid) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM queued_actions WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Merge `patch` into the stored action and return the merged record.
pub async fn update(
    pool: &SqlitePool,
    id: Uuid,
    patch: &ActionPatch,
) -> Result<QueuedAction, StoreError> {
    sqlx::query_as::<_, QueuedAction>(&format!(
        "UPDATE queued_actions
         SET retry_count = COALESCE(?2, retry_count),
             max_retries = COALESCE(?3, max_retries),
             data = COALESCE(?4, data)
         WHERE id = ?1
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(patch.retry_count)
    .bind(patch.max_retries)
    .bind(patch.data.as_ref())
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound(id))
}
