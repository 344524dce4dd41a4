//! External collaborator contracts.
//!
//! The orchestrator never talks to a cluster directly. Plans are handed to
//! the scheduler and the sync service by context id; both look the plan up
//! in the shared store.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fleetgrid_placement::ClusterLabels;
use fleetgrid_plan::TemplateRenderer;
use fleetgrid_state::{ClusterRef, LogicalCloud, LogicalCloudStatus};

/// Source of logical cloud definitions.
#[async_trait]
pub trait LogicalCloudProvider: Send + Sync {
    async fn get(&self, project: &str, name: &str) -> anyhow::Result<LogicalCloud>;

    /// Clusters the cloud provides.
    async fn clusters(&self, project: &str, name: &str) -> anyhow::Result<Vec<ClusterRef>>;

    async fn status(&self, project: &str, name: &str) -> anyhow::Result<LogicalCloudStatus>;
}

/// Notifications posted to downstream controllers after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEvent {
    Instantiate,
    Update,
    Terminate,
    Migrate,
    Rollback,
}

impl fmt::Display for PlanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanEvent::Instantiate => "instantiate",
            PlanEvent::Update => "update",
            PlanEvent::Terminate => "terminate",
            PlanEvent::Migrate => "migrate",
            PlanEvent::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

/// External scheduler.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Schedule a persisted plan, optionally replacing `predecessor`.
    async fn schedule(&self, context_id: &str, predecessor: Option<&str>) -> anyhow::Result<()>;

    async fn terminate(&self, context_id: &str) -> anyhow::Result<()>;

    async fn post_event(&self, context_id: &str, event: PlanEvent) -> anyhow::Result<()>;
}

/// External sync/installer service.
#[async_trait]
pub trait SyncService: Send + Sync {
    async fn install(&self, context_id: &str) -> anyhow::Result<()>;

    async fn update(&self, old_context_id: &str, new_context_id: &str) -> anyhow::Result<()>;

    async fn uninstall(&self, context_id: &str) -> anyhow::Result<()>;
}

/// Everything the orchestrator calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub clouds: Arc<dyn LogicalCloudProvider>,
    pub labels: Arc<dyn ClusterLabels>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub scheduler: Arc<dyn Scheduler>,
    pub sync: Arc<dyn SyncService>,
}
