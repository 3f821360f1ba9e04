use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of mutations the client may queue while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendMessage,
    CreateChecklistItem,
    UpdateChecklistItem,
    DeleteMessage,
    DeleteChecklistItem,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::SendMessage,
        ActionType::CreateChecklistItem,
        ActionType::UpdateChecklistItem,
        ActionType::DeleteMessage,
        ActionType::DeleteChecklistItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SendMessage => "send_message",
            ActionType::CreateChecklistItem => "create_checklist_item",
            ActionType::UpdateChecklistItem => "update_checklist_item",
            ActionType::DeleteMessage => "delete_message",
            ActionType::DeleteChecklistItem => "delete_checklist_item",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown action type: {s}"))
    }
}

/// A mutation awaiting delivery to the backend.
///
/// `action_type` is kept as the raw stored string: rows written by another
/// build of the agent may carry a type this build does not know, and the
/// sync pass has to be able to see (and drop) them.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub action_type: String,
    pub event_id: String,
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub retry_count: i32,
    pub max_retries: i32,
}

impl QueuedAction {
    pub fn kind(&self) -> Option<ActionType> {
        self.action_type.parse().ok()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Fields of a queued action that may be merged in by `update`.
#[derive(Debug, Clone, Default)]
pub struct ActionPatch {
    pub retry_count: Option<i32>,
    pub max_retries: Option<i32>,
    pub data: Option<serde_json::Value>,
}

impl ActionPatch {
    pub fn retry_count(retry_count: i32) -> Self {
        Self {
            retry_count: Some(retry_count),
            ..Self::default()
        }
    }
}
