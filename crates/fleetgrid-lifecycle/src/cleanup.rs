//! Cleanup queue — background deletion of plans nobody needs any more.
//!
//! Plans abandoned by a failed instantiation and plans of deleted groups are
//! queued here instead of being deleted inline. A single worker task drains
//! the queue, retrying each deletion with exponential backoff. Deletion is
//! idempotent, so a context queued twice is harmless. Failures are logged and
//! never reach the operation that queued the context.

use fleetgrid_core::CleanupConfig;
use fleetgrid_state::{ContextId, StateStore};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cheap handle for queueing plan deletions.
#[derive(Debug, Clone)]
pub struct CleanupHandle {
    tx: mpsc::UnboundedSender<ContextId>,
}

impl CleanupHandle {
    /// Queue `context_id` for deletion. Never blocks.
    pub fn enqueue(&self, context_id: &str) {
        if self.tx.send(context_id.to_string()).is_err() {
            warn!(%context_id, "cleanup worker gone, plan left behind");
        } else {
            debug!(%context_id, "plan queued for deletion");
        }
    }
}

/// Owns the cleanup worker task.
pub struct CleanupQueue {
    handle: CleanupHandle,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl CleanupQueue {
    /// Spawn the worker on the current runtime.
    pub fn start(store: StateStore, config: CleanupConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(async move {
            run_cleanup_loop(store, config, rx, shutdown_rx).await;
        });

        info!("cleanup queue started");
        Self {
            handle: CleanupHandle { tx },
            shutdown_tx,
            worker,
        }
    }

    pub fn handle(&self) -> CleanupHandle {
        self.handle.clone()
    }

    /// Stop the worker after it has drained everything queued so far.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.worker.await {
            error!(error = %e, "cleanup worker panicked");
        }
        info!("cleanup queue stopped");
    }
}

async fn run_cleanup_loop(
    store: StateStore,
    config: CleanupConfig,
    mut rx: mpsc::UnboundedReceiver<ContextId>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(context_id) => delete_with_retry(&store, &config, &context_id).await,
                None => break,
            },
            _ = shutdown.changed() => {
                while let Ok(context_id) = rx.try_recv() {
                    delete_with_retry(&store, &config, &context_id).await;
                }
                debug!("cleanup loop shutting down");
                break;
            }
        }
    }
}

async fn delete_with_retry(store: &StateStore, config: &CleanupConfig, context_id: &str) {
    let attempts = config.max_attempts.max(1);
    for attempt in 0..attempts {
        match store.delete_plan(context_id) {
            Ok(existed) => {
                debug!(%context_id, existed, "plan cleaned up");
                return;
            }
            Err(e) => {
                warn!(%context_id, attempt, error = %e, "plan deletion failed");
                if attempt + 1 < attempts {
                    tokio::time::sleep(config.backoff(attempt)).await;
                }
            }
        }
    }
    error!(%context_id, attempts, "giving up on plan deletion");
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgrid_state::*;

    fn plan() -> ExecutionPlan {
        ExecutionPlan {
            meta: CompositeMeta {
                project: "p".to_string(),
                composite_app: "ca".to_string(),
                version: "v1".to_string(),
                release: "g".to_string(),
                group: "g".to_string(),
                namespace: "default".to_string(),
                logical_cloud: "lc".to_string(),
                level: CloudLevel::Standard,
            },
            apps: Vec::new(),
            instructions: PlanInstructions::default(),
        }
    }

    #[tokio::test]
    async fn queued_plans_are_deleted_before_shutdown_returns() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store.persist_plan(plan()).unwrap();
        let b = store.persist_plan(plan()).unwrap();
        let keep = store.persist_plan(plan()).unwrap();

        let queue = CleanupQueue::start(store.clone(), CleanupConfig::default());
        let handle = queue.handle();
        handle.enqueue(&a);
        handle.enqueue(&b);
        // Queueing the same context twice is harmless.
        handle.enqueue(&a);
        queue.shutdown().await;

        assert!(store.get_plan(&a).unwrap().is_none());
        assert!(store.get_plan(&b).unwrap().is_none());
        assert!(store.get_plan(&keep).unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_context_is_not_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        let queue = CleanupQueue::start(store, CleanupConfig::default());
        queue.handle().enqueue("never-persisted");
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_does_not_panic() {
        let store = StateStore::open_in_memory().unwrap();
        let queue = CleanupQueue::start(store, CleanupConfig::default());
        let handle = queue.handle();
        queue.shutdown().await;
        handle.enqueue("late");
    }
}
