use async_trait::async_trait;
use tokio::sync::RwLock;

/// Supplies the bearer token the sync pass authenticates with.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

/// Token handed over by the main application through the control API.
#[derive(Default)]
pub struct TokenSlot {
    token: RwLock<Option<String>>,
}

impl TokenSlot {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial),
        }
    }

    pub async fn set(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[async_trait]
impl CredentialSource for TokenSlot {
    async fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| !t.is_empty())
            .cloned()
    }
}
