//! Lifecycle error types.

use fleetgrid_placement::PlacementError;
use fleetgrid_plan::PlanError;
use fleetgrid_state::{GroupState, StateError};
use thiserror::Error;

use crate::state_machine::Operation;

/// Coarse classification of a lifecycle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input. Never retried.
    Validation,
    /// Operation illegal in the current state.
    Precondition,
    /// The instantiation cannot be resolved to a plan.
    Resolution,
    /// An external collaborator failed.
    Collaborator,
    NotFound,
    Store,
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("cannot {operation} deployment group in state {state}")]
    InvalidState {
        operation: Operation,
        state: GroupState,
    },

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::InvalidState { .. } | LifecycleError::Precondition(_) => {
                ErrorKind::Precondition
            }
            LifecycleError::Validation(_) => ErrorKind::Validation,
            LifecycleError::Placement(e) if e.is_validation() => ErrorKind::Validation,
            LifecycleError::Placement(_) => ErrorKind::Collaborator,
            LifecycleError::Plan(e) if e.is_validation() => ErrorKind::Validation,
            LifecycleError::Plan(PlanError::Render { .. })
            | LifecycleError::Plan(PlanError::Placement { .. }) => ErrorKind::Collaborator,
            LifecycleError::Plan(_) => ErrorKind::Resolution,
            LifecycleError::Collaborator { .. } => ErrorKind::Collaborator,
            LifecycleError::State(_) => ErrorKind::Store,
        }
    }

    pub(crate) fn collaborator(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| LifecycleError::Collaborator { operation, source }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
