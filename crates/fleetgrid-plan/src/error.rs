//! Plan builder error types.

use fleetgrid_placement::PlacementError;
use fleetgrid_state::{ClusterRef, LogicalCloudStatus};
use thiserror::Error;

/// Errors that abort a plan build.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cyclic application dependency among [{}]", apps.join(", "))]
    DependencyCycle { apps: Vec<String> },

    #[error("application '{app}' depends on unknown application '{dependency}'")]
    UnknownDependency { app: String, dependency: String },

    #[error("logical cloud '{name}' is not instantiated (status {status:?})")]
    LogicalCloudNotReady {
        name: String,
        status: LogicalCloudStatus,
    },

    #[error("no compatible clusters found for application '{app}'")]
    NoCompatibleClusters { app: String },

    #[error("mandatory cluster {cluster} of application '{app}' is not part of logical cloud '{logical_cloud}'")]
    ClusterNotInLogicalCloud {
        app: String,
        cluster: ClusterRef,
        logical_cloud: String,
    },

    #[error("placement of application '{app}' failed: {source}")]
    Placement {
        app: String,
        #[source]
        source: PlacementError,
    },

    #[error("rendering application '{app}' failed: {source}")]
    Render {
        app: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PlanError {
    /// True for malformed input rather than an unresolvable placement.
    pub fn is_validation(&self) -> bool {
        match self {
            PlanError::UnknownDependency { .. } => true,
            PlanError::Placement { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
