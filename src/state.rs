use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::credentials::TokenSlot;
use crate::queue::ActionQueue;
use crate::sync::{SyncCoordinator, SyncEvent};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub connectivity: Arc<Connectivity>,
    pub credentials: Arc<TokenSlot>,
    pub coordinator: Arc<SyncCoordinator>,
    pub queue: ActionQueue,
    pub cache: CacheLayer,
    pub events: broadcast::Sender<SyncEvent>,
}
