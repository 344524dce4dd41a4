//! fleetgrid placement — cluster selector resolution and intent validation.
//!
//! Turns declarative placement intents into concrete cluster assignments.
//! It does NOT build execution plans (that's `fleetgrid-plan`); it only
//! answers "which clusters" for a single application.
//!
//! # Components
//!
//! - **`resolver`** — Intent → mandatory/optional cluster groups
//! - **`validate`** — Clause checks and label expansion against a logical cloud
//! - **`labels`** — Cluster label lookup contract

pub mod error;
pub mod labels;
pub mod resolver;
pub mod validate;

pub use error::{PlacementError, PlacementResult};
pub use labels::{ClusterLabels, StaticLabels};
pub use resolver::resolve;
pub use validate::{check_intent, validate_and_expand};
