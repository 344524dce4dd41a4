//! Placement error types.

use fleetgrid_state::ClusterRef;
use thiserror::Error;

/// Errors raised while validating or resolving a placement intent.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("{clause}: provider is required")]
    MissingProvider { clause: String },

    #[error("{clause}: one of cluster name or cluster label is required")]
    MissingSelector { clause: String },

    #[error("{clause}: cluster name and cluster label are mutually exclusive")]
    NameAndLabel { clause: String },

    #[error("{clause}: invalid {field} '{value}'")]
    InvalidName {
        clause: String,
        field: &'static str,
        value: String,
    },

    #[error("{clause}: label '{label}' matches no cluster of provider '{provider}'")]
    NoLabelMatch {
        clause: String,
        provider: String,
        label: String,
    },

    #[error("cluster {cluster} is not part of logical cloud '{logical_cloud}'")]
    NotInLogicalCloud {
        cluster: ClusterRef,
        logical_cloud: String,
    },

    #[error("{clause}: label lookup for '{provider}/{label}' failed: {source}")]
    LabelLookup {
        clause: String,
        provider: String,
        label: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PlacementError {
    /// True for malformed intents and logical cloud membership violations.
    pub fn is_validation(&self) -> bool {
        !matches!(self, PlacementError::LabelLookup { .. })
    }
}

pub type PlacementResult<T> = Result<T, PlacementError>;
