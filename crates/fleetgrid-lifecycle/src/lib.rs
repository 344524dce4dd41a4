//! fleetgrid lifecycle — deployment group state machine and instantiation
//! orchestration.
//!
//! Each deployment group carries an append-only action log. The
//! orchestrator gates every operation on the log's current state, builds
//! plans, drives the external scheduler and sync services, and commits the
//! resulting state by appending to the log.
//!
//! # Components
//!
//! - **`state_machine`** — Which operation is legal from which state
//! - **`collaborators`** — Logical cloud, scheduler and sync contracts
//! - **`orchestrator`** — Approve, instantiate, update, rollback, migrate, terminate, stop, delete
//! - **`cleanup`** — Background plan deletion queue
//! - **`observe`** — Injected observability sink

pub mod cleanup;
pub mod collaborators;
pub mod error;
pub mod observe;
pub mod orchestrator;
pub mod state_machine;

pub use cleanup::{CleanupHandle, CleanupQueue};
pub use collaborators::{Collaborators, LogicalCloudProvider, PlanEvent, Scheduler, SyncService};
pub use error::{ErrorKind, LifecycleError, LifecycleResult};
pub use observe::{LogSink, NoopSink, ObservabilitySink, RecordingSink, Sample};
pub use orchestrator::{GroupStatus, Orchestrator};
pub use state_machine::Operation;
