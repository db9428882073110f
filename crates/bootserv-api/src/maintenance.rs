//! # In-Process Maintenance
//!
//! Optional periodic prune of the RC store. Deployments that run
//! `bootserv prune` from a timer leave this off; the two never overlap
//! because both take the store's maintenance lock.

use std::sync::Arc;
use std::time::Duration;

use bootserv_core::{PruneReport, RcStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("prune task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run one prune pass on the blocking pool.
///
/// A pass already in progress elsewhere is not an error here; it yields
/// `Ok(None)`.
pub async fn prune_once(store: Arc<RcStore>) -> Result<Option<PruneReport>, MaintenanceError> {
    match tokio::task::spawn_blocking(move || store.prune()).await? {
        Ok(report) => Ok(Some(report)),
        Err(StoreError::PruneInProgress(lock)) => {
            tracing::warn!(lock = %lock.display(), "prune skipped, another pass holds the lock");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Spawn a task pruning `store` every `period`. The first pass runs one
/// period after startup.
pub fn spawn_prune_task(store: Arc<RcStore>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match prune_once(Arc::clone(&store)).await {
                Ok(Some(report)) => {
                    tracing::info!(
                        removed = report.removed,
                        examined = report.examined,
                        failed = report.failed,
                        "scheduled prune done"
                    );
                }
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "scheduled prune failed"),
            }
        }
    })
}
