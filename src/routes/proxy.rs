use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::cache::ProxyRequest;
use crate::models::CachedResponse;
use crate::state::SharedState;

/// Everything outside the control API is relayed through the cache layer.
pub async fn forward(State(state): State<SharedState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();

    let body = match axum::body::to_bytes(body, state.config.max_body_size).await {
        Ok(body) => body,
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body too large" })),
            )
                .into_response();
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let resp = state
        .cache
        .handle(ProxyRequest {
            method: parts.method,
            path_and_query,
            headers: parts.headers,
            body,
        })
        .await;

    into_response(resp)
}

fn into_response(resp: CachedResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(resp.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &resp.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }

    response
}
