//! fleetgrid-state — embedded state store for fleetgrid.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! state management for the orchestration catalog (composite apps, profiles,
//! deployment groups, app intents), the lifecycle log of every deployment
//! group, and the arena of execution plans addressed by context id.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{project}/{composite_app}/{version}/{group}`) enable
//! prefix scans for related records.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod context;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use context::*;
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
