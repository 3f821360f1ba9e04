use reqwest::Method;
use serde_json::{Value, json};

use crate::models::{ActionType, QueuedAction};

/// The HTTP call a queued action replays as.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Why an action cannot be turned into a request. Both cases are local
/// defects that no amount of retrying will fix.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    UnknownType(String),
    MissingField {
        action_type: ActionType,
        field: &'static str,
    },
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingError::UnknownType(t) => write!(f, "unknown action type '{t}'"),
            MappingError::MissingField { action_type, field } => {
                write!(f, "{action_type} payload is missing '{field}'")
            }
        }
    }
}

impl DeliveryRequest {
    pub fn for_action(action: &QueuedAction) -> Result<Self, MappingError> {
        let action_type = action
            .kind()
            .ok_or_else(|| MappingError::UnknownType(action.action_type.clone()))?;
        let event_id = &action.event_id;
        let data = &action.data;

        let request = match action_type {
            ActionType::SendMessage => DeliveryRequest {
                method: Method::POST,
                path: format!("/api/events/{event_id}/messages"),
                body: Some(json!({ "message": field(data, action_type, "message")? })),
            },
            ActionType::CreateChecklistItem => DeliveryRequest {
                method: Method::POST,
                path: format!("/api/events/{event_id}/checklist"),
                body: Some(data.clone()),
            },
            ActionType::UpdateChecklistItem => {
                let item_id = id_field(data, action_type, "itemId")?;
                DeliveryRequest {
                    method: Method::PUT,
                    path: format!("/api/events/{event_id}/checklist/{item_id}"),
                    body: Some(field(data, action_type, "updates")?.clone()),
                }
            }
            ActionType::DeleteMessage => {
                let message_id = id_field(data, action_type, "messageId")?;
                DeliveryRequest {
                    method: Method::DELETE,
                    path: format!("/api/events/{event_id}/messages/{message_id}"),
                    body: None,
                }
            }
            ActionType::DeleteChecklistItem => {
                let item_id = id_field(data, action_type, "itemId")?;
                DeliveryRequest {
                    method: Method::DELETE,
                    path: format!("/api/events/{event_id}/checklist/{item_id}"),
                    body: None,
                }
            }
        };

        Ok(request)
    }
}

fn field<'a>(
    data: &'a Value,
    action_type: ActionType,
    name: &'static str,
) -> Result<&'a Value, MappingError> {
    data.get(name)
        .filter(|v| !v.is_null())
        .ok_or(MappingError::MissingField {
            action_type,
            field: name,
        })
}

/// Resource ids arrive as strings from the client but numbers are tolerated.
fn id_field(data: &Value, action_type: ActionType, name: &'static str) -> Result<String, MappingError> {
    match field(data, action_type, name)? {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(MappingError::MissingField {
            action_type,
            field: name,
        }),
    }
}
