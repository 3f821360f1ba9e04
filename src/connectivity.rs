use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The agent's view of platform connectivity.
///
/// Receivers observe every offline -> online edge, which is what the
/// trigger loop turns into a connectivity-restored sync.
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current signal. Returns true if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::warn!("Connectivity lost, mutations will be queued");
            }
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Periodically probe `health_url` and feed the result into `connectivity`.
/// Any HTTP response counts as online; only transport failures mean offline.
pub fn spawn_probe(
    connectivity: Arc<Connectivity>,
    client: reqwest::Client,
    health_url: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Connectivity probe started ({health_url} every {interval:?})");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let online = match client.get(&health_url).send().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("Connectivity probe failed: {e}");
                    false
                }
            };
            connectivity.set_online(online);
        }

        tracing::debug!("Connectivity probe stopped");
    })
}
