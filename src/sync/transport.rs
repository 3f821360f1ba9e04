use async_trait::async_trait;

use super::request::DeliveryRequest;

/// A network-level failure: nothing usable came back from the backend.
#[derive(Debug)]
pub struct TransportError {
    pub message: String,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError {
            message: format!("Request failed: {err}"),
        }
    }
}

/// Sends a delivery request and reports the HTTP status the backend answered with.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &DeliveryRequest, token: &str) -> Result<u16, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &DeliveryRequest, token: &str) -> Result<u16, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut req = self
            .client
            .request(request.method.clone(), &url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");

        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();

        tracing::debug!("{} {} -> {status}", request.method, request.path);
        Ok(status)
    }
}
