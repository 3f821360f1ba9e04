use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use crate::connectivity::Connectivity;
use crate::sync::{SyncCoordinator, SyncOutcome, SyncTrigger};

/// Start the trigger loop: connectivity-restored edges and the periodic
/// background wake both start passes until shutdown is signaled.
pub fn spawn(
    coordinator: Arc<SyncCoordinator>,
    connectivity: Arc<Connectivity>,
    wake: Option<(Duration, String)>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(coordinator, connectivity, wake, shutdown))
}

async fn run(
    coordinator: Arc<SyncCoordinator>,
    connectivity: Arc<Connectivity>,
    wake: Option<(Duration, String)>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut online_rx = connectivity.subscribe();
    let mut was_online = *online_rx.borrow_and_update();

    let (mut ticker, tag) = match wake {
        Some((period, tag)) => (Some(tokio::time::interval_at(Instant::now() + period, period)), tag),
        None => (None, String::new()),
    };

    tracing::info!("Sync trigger loop started");

    loop {
        tokio::select! {
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *online_rx.borrow_and_update();
                if online && !was_online {
                    fire(&coordinator, SyncTrigger::ConnectivityRestored);
                }
                was_online = online;
            }
            _ = next_tick(&mut ticker) => {
                fire(&coordinator, SyncTrigger::BackgroundWake { tag: tag.clone() });
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if *shutdown.borrow() {
            break;
        }
    }

    tracing::info!("Sync trigger loop stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Passes run on their own task so the loop keeps observing triggers;
/// the coordinator drops any that arrive mid-pass.
fn fire(coordinator: &Arc<SyncCoordinator>, trigger: SyncTrigger) {
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        match coordinator.trigger(trigger).await {
            Ok(SyncOutcome::Ran { .. }) => {}
            Ok(outcome) => tracing::debug!("Trigger not run: {outcome:?}"),
            Err(e) => tracing::error!("Sync pass failed: {e}"),
        }
    });
}
