use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, watch};

use super::executor::SyncExecutor;
use super::{PassReport, SyncTrigger};
use crate::connectivity::Connectivity;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Ran { report: PassReport },
    /// A pass was already in progress; this trigger was coalesced into it.
    AlreadyRunning,
    Offline,
    IgnoredTag { tag: String },
}

/// Owns the Idle/Syncing state machine in front of the executor.
pub struct SyncCoordinator {
    executor: SyncExecutor,
    connectivity: Arc<Connectivity>,
    sync_tag: String,
    running: AtomicBool,
    state: watch::Sender<SyncState>,
    last_report: Mutex<Option<PassReport>>,
}

/// Held for the lifetime of a pass. Dropping it is the pass-completion
/// callback: it clears the flag and publishes `Idle`, on every exit path.
struct PassGuard {
    coordinator: Arc<SyncCoordinator>,
}

impl PassGuard {
    fn acquire(coordinator: &Arc<SyncCoordinator>) -> Option<Self> {
        coordinator
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        coordinator.state.send_replace(SyncState::Syncing);
        Some(Self {
            coordinator: coordinator.clone(),
        })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.coordinator.running.store(false, Ordering::Release);
        self.coordinator.state.send_replace(SyncState::Idle);
    }
}

impl SyncCoordinator {
    pub fn new(executor: SyncExecutor, connectivity: Arc<Connectivity>, sync_tag: String) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            executor,
            connectivity,
            sync_tag,
            running: AtomicBool::new(false),
            state,
            last_report: Mutex::new(None),
        }
    }

    /// Start a pass for `trigger` unless one is running, the agent is
    /// offline, or a background wake carries a foreign tag.
    ///
    /// The pass runs on its own task: dropping the returned future stops the
    /// wait, never the pass.
    pub async fn trigger(self: &Arc<Self>, trigger: SyncTrigger) -> Result<SyncOutcome, StoreError> {
        if let SyncTrigger::BackgroundWake { tag } = &trigger {
            if *tag != self.sync_tag {
                tracing::debug!("Ignoring background wake with tag '{tag}'");
                return Ok(SyncOutcome::IgnoredTag { tag: tag.clone() });
            }
        }

        if !self.connectivity.is_online() {
            tracing::debug!("Skipping sync ({trigger}): offline");
            return Ok(SyncOutcome::Offline);
        }

        let Some(guard) = PassGuard::acquire(self) else {
            tracing::debug!("Sync already in progress, coalescing {trigger} trigger");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let pass = tokio::spawn(async move {
            let coordinator = guard.coordinator.clone();
            let report = coordinator.executor.run_pass(trigger).await?;
            *coordinator.last_report.lock().await = Some(report.clone());
            drop(guard);
            Ok::<_, StoreError>(report)
        });

        let report = match pass.await {
            Ok(result) => result?,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };
        Ok(SyncOutcome::Ran { report })
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn is_syncing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub async fn last_report(&self) -> Option<PassReport> {
        self.last_report.lock().await.clone()
    }
}
