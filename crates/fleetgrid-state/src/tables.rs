//! redb table definitions for the fleetgrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Composite keys follow the pattern `{project}/{composite_app}/{version}/...`
//! so that prefix scans find everything below a composite app or group.

use redb::TableDefinition;

/// Composite apps keyed by `{project}/{name}/{version}`.
pub const COMPOSITE_APPS: TableDefinition<&str, &[u8]> = TableDefinition::new("composite_apps");

/// Composite profiles keyed by `{project}/{composite_app}/{version}/{profile}`.
pub const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

/// Deployment groups keyed by `{project}/{composite_app}/{version}/{group}`.
pub const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Lifecycle logs keyed like [`GROUPS`].
pub const GROUP_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("group_states");

/// App placement intents keyed by `{group_key}/{placement_intent}/{app}`.
pub const APP_INTENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("app_intents");

/// Execution plans keyed by context id.
pub const PLANS: TableDefinition<&str, &[u8]> = TableDefinition::new("plans");
