//! Domain types for the fleetgrid state store.
//!
//! These types represent the persisted catalog (composite apps, profiles,
//! deployment groups, placement intents) and the lifecycle log of each
//! deployment group. All types are serializable to/from JSON for storage
//! in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a persisted execution plan.
pub type ContextId = String;

// ── Clusters ───────────────────────────────────────────────────────

/// A concrete cluster, scoped by its provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterRef {
    pub provider: String,
    pub name: String,
}

impl ClusterRef {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.provider, self.name)
    }
}

// ── Logical clouds ─────────────────────────────────────────────────

/// Privilege level of a logical cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudLevel {
    /// Cluster-wide access; workloads use the group's namespace.
    Admin,
    /// Namespace-confined access; workloads are forced into the cloud namespace.
    #[default]
    Standard,
}

/// A named view over a subset of clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalCloud {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub level: CloudLevel,
}

/// Instantiation status of a logical cloud as reported by its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalCloudStatus {
    Created,
    Instantiating,
    Instantiated,
    Terminated,
    Failed,
}

// ── Placement intents ──────────────────────────────────────────────

/// Whether an intent selects clusters by explicit name or by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[default]
    Name,
    Label,
}

/// A single cluster selector: a provider plus a cluster name or label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectorClause {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_label: Option<String>,
}

impl SelectorClause {
    pub fn by_name(provider: &str, cluster: &str) -> Self {
        Self {
            provider: provider.to_string(),
            cluster_name: Some(cluster.to_string()),
            cluster_label: None,
        }
    }

    pub fn by_label(provider: &str, label: &str) -> Self {
        Self {
            provider: provider.to_string(),
            cluster_name: None,
            cluster_label: Some(label.to_string()),
        }
    }
}

/// A mandatory clause. May carry a nested alternation of selectors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllOfClause {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SelectorClause>,
}

impl AllOfClause {
    pub fn by_name(provider: &str, cluster: &str) -> Self {
        Self::from_selector(SelectorClause::by_name(provider, cluster))
    }

    pub fn by_label(provider: &str, label: &str) -> Self {
        Self::from_selector(SelectorClause::by_label(provider, label))
    }

    pub fn from_selector(selector: SelectorClause) -> Self {
        Self {
            provider: selector.provider,
            cluster_name: selector.cluster_name,
            cluster_label: selector.cluster_label,
            any_of: Vec::new(),
        }
    }

    /// The clause's own selector, without the nested alternation.
    pub fn selector(&self) -> SelectorClause {
        SelectorClause {
            provider: self.provider.clone(),
            cluster_name: self.cluster_name.clone(),
            cluster_label: self.cluster_label.clone(),
        }
    }
}

/// Declarative cluster selection for one application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlacementIntent {
    #[serde(default)]
    pub all_of: Vec<AllOfClause>,
    #[serde(default)]
    pub any_of: Vec<SelectorClause>,
    #[serde(default)]
    pub selector: SelectorKind,
}

impl PlacementIntent {
    /// True if any clause, nested ones included, selects by label.
    pub fn uses_labels(&self) -> bool {
        self.all_of.iter().any(|c| {
            c.cluster_label.is_some() || c.any_of.iter().any(|n| n.cluster_label.is_some())
        }) || self.any_of.iter().any(|c| c.cluster_label.is_some())
    }

    /// Set the selector tag from the clauses.
    pub fn tag_selector(&mut self) {
        self.selector = if self.uses_labels() {
            SelectorKind::Label
        } else {
            SelectorKind::Name
        };
    }
}

/// Kinds of intents a deployment group can reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentKind {
    /// Cluster placement, resolved by this orchestrator.
    GenericPlacement,
    /// Intent owned by an external action controller; carried, never resolved here.
    Controller { controller: String },
}

/// A named intent attached to a deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRef {
    pub kind: IntentKind,
    pub name: String,
}

/// The placement intent of one application within a deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIntent {
    pub name: String,
    /// Name of the generic placement intent this belongs to.
    pub placement_intent: String,
    pub app: String,
    pub intent: PlacementIntent,
}

// ── Composite applications ─────────────────────────────────────────

/// Condition a dependent application waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCondition {
    Deployed,
    Ready,
}

/// A sub-application of a composite application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reference to the packaged content (archive or directory).
    pub content: String,
    /// App name → condition that must hold before this app is installed.
    #[serde(default)]
    pub dependency: BTreeMap<String, DependencyCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeApp {
    pub project: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub apps: Vec<Application>,
}

/// Per-application profile content for a composite app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeProfile {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub name: String,
    /// App name → profile content reference.
    #[serde(default)]
    pub app_profiles: BTreeMap<String, String>,
}

// ── Deployment groups ──────────────────────────────────────────────

/// Override values applied to one application when rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideValues {
    pub app: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl OverrideValues {
    /// Render as `key=value` strings.
    pub fn as_strings(&self) -> Vec<String> {
        self.values.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Address of a deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub group: String,
}

impl GroupKey {
    pub fn new(project: &str, composite_app: &str, version: &str, group: &str) -> Self {
        Self {
            project: project.to_string(),
            composite_app: composite_app.to_string(),
            version: version.to_string(),
            group: group.to_string(),
        }
    }

    /// Build the composite key for the groups and states tables.
    pub fn table_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.project, self.composite_app, self.version, self.group
        )
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_key())
    }
}

/// The unit under lifecycle control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentGroup {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Composite profile name.
    pub profile: String,
    pub logical_cloud: String,
    /// Namespace used on admin-level logical clouds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Release name; defaults to the group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default)]
    pub override_values: Vec<OverrideValues>,
    #[serde(default)]
    pub intents: Vec<IntentRef>,
    /// External services this group is attached to.
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub instantiated_services: Vec<String>,
    #[serde(default)]
    pub created_at: u64,
}

impl DeploymentGroup {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(&self.project, &self.composite_app, &self.version, &self.name)
    }

    /// Name of the generic placement intent, if one is attached.
    pub fn placement_intent(&self) -> Option<&str> {
        self.intents
            .iter()
            .find(|i| i.kind == IntentKind::GenericPlacement)
            .map(|i| i.name.as_str())
    }

    pub fn release_name(&self) -> &str {
        self.release.as_deref().unwrap_or(&self.name)
    }

    pub fn overrides_for(&self, app: &str) -> Vec<String> {
        self.override_values
            .iter()
            .filter(|o| o.app == app)
            .flat_map(OverrideValues::as_strings)
            .collect()
    }
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Lifecycle states of a deployment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Created,
    Approved,
    /// Sentinel: no operation is valid from here. Never appended.
    Applied,
    Instantiated,
    InstantiateStopped,
    Terminated,
    TerminateStopped,
    Updated,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupState::Created => "Created",
            GroupState::Approved => "Approved",
            GroupState::Applied => "Applied",
            GroupState::Instantiated => "Instantiated",
            GroupState::InstantiateStopped => "InstantiateStopped",
            GroupState::Terminated => "Terminated",
            GroupState::TerminateStopped => "TerminateStopped",
            GroupState::Updated => "Updated",
        };
        f.write_str(s)
    }
}

/// One appended entry of the lifecycle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub state: GroupState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    pub revision: u64,
}

/// Append-only action log of a deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifecycleState {
    pub actions: Vec<ActionEntry>,
    /// Context id used for status queries; fixed at first instantiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_context_id: Option<ContextId>,
}

/// Entries to append to one group's log; see `StateStore::append_to_logs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAppend {
    pub key: GroupKey,
    pub entries: Vec<ActionEntry>,
    /// Replaces the log's status context id when set.
    pub status_context: Option<ContextId>,
}

impl LifecycleState {
    pub fn current_state(&self) -> Option<GroupState> {
        self.actions.last().map(|a| a.state)
    }

    pub fn current_context(&self) -> Option<&str> {
        self.actions.last().and_then(|a| a.context_id.as_deref())
    }

    pub fn current_revision(&self) -> Option<u64> {
        self.actions.last().map(|a| a.revision)
    }

    /// Highest revision recorded by any `Instantiated` entry.
    pub fn last_revision(&self) -> Option<u64> {
        self.actions
            .iter()
            .filter(|a| a.state == GroupState::Instantiated)
            .map(|a| a.revision)
            .max()
    }

    /// Context id of the most recent `Instantiated` entry at `revision`.
    pub fn context_for_revision(&self, revision: u64) -> Option<&str> {
        self.actions
            .iter()
            .rev()
            .find(|a| a.state == GroupState::Instantiated && a.revision == revision)
            .and_then(|a| a.context_id.as_deref())
    }

    /// Every distinct context id referenced by the log, oldest first.
    pub fn referenced_contexts(&self) -> Vec<ContextId> {
        let mut seen = Vec::new();
        for ctx in self.actions.iter().filter_map(|a| a.context_id.as_ref()) {
            if !seen.contains(ctx) {
                seen.push(ctx.clone());
            }
        }
        seen
    }
}

impl CompositeApp {
    /// Build the composite key for the composite apps table.
    pub fn table_key(&self) -> String {
        composite_key(&self.project, &self.name, &self.version)
    }

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.apps.iter().find(|a| a.name == name)
    }
}

impl CompositeProfile {
    /// Build the composite key for the profiles table.
    pub fn table_key(&self) -> String {
        format!(
            "{}/{}",
            composite_key(&self.project, &self.composite_app, &self.version),
            self.name
        )
    }
}

impl AppIntent {
    /// Build the composite key for the app intents table under `group`.
    pub fn table_key(&self, group: &GroupKey) -> String {
        format!("{}/{}/{}", group.table_key(), self.placement_intent, self.app)
    }
}

/// `{project}/{composite_app}/{version}`.
pub fn composite_key(project: &str, composite_app: &str, version: &str) -> String {
    format!("{project}/{composite_app}/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: GroupState, ctx: Option<&str>, revision: u64) -> ActionEntry {
        ActionEntry {
            state,
            context_id: ctx.map(str::to_string),
            timestamp: 1000,
            revision,
        }
    }

    #[test]
    fn label_anywhere_tags_intent_as_label() {
        let mut intent = PlacementIntent {
            all_of: vec![AllOfClause {
                any_of: vec![SelectorClause::by_label("aws", "edge")],
                ..AllOfClause::by_name("aws", "c1")
            }],
            ..Default::default()
        };
        intent.tag_selector();
        assert_eq!(intent.selector, SelectorKind::Label);

        intent.all_of[0].any_of.clear();
        intent.tag_selector();
        assert_eq!(intent.selector, SelectorKind::Name);
    }

    #[test]
    fn revision_lookup_prefers_instantiated_entries() {
        let state = LifecycleState {
            actions: vec![
                entry(GroupState::Created, None, 0),
                entry(GroupState::Approved, None, 0),
                entry(GroupState::Instantiated, Some("c1"), 0),
                entry(GroupState::Updated, Some("c1"), 0),
                entry(GroupState::Instantiated, Some("c2"), 1),
            ],
            status_context_id: Some("c1".to_string()),
        };

        assert_eq!(state.current_state(), Some(GroupState::Instantiated));
        assert_eq!(state.current_context(), Some("c2"));
        assert_eq!(state.last_revision(), Some(1));
        assert_eq!(state.context_for_revision(0), Some("c1"));
        assert_eq!(state.context_for_revision(7), None);
        assert_eq!(state.referenced_contexts(), vec!["c1", "c2"]);
    }

    #[test]
    fn group_helpers() {
        let group = DeploymentGroup {
            project: "p".to_string(),
            composite_app: "ca".to_string(),
            version: "v1".to_string(),
            name: "g".to_string(),
            description: String::new(),
            profile: "prof".to_string(),
            logical_cloud: "lc".to_string(),
            namespace: None,
            release: None,
            override_values: vec![OverrideValues {
                app: "app1".to_string(),
                values: BTreeMap::from([("replicas".to_string(), "2".to_string())]),
            }],
            intents: vec![
                IntentRef {
                    kind: IntentKind::Controller {
                        controller: "net".to_string(),
                    },
                    name: "net-intent".to_string(),
                },
                IntentRef {
                    kind: IntentKind::GenericPlacement,
                    name: "placement".to_string(),
                },
            ],
            services: Vec::new(),
            instantiated_services: Vec::new(),
            created_at: 0,
        };

        assert_eq!(group.key().table_key(), "p/ca/v1/g");
        assert_eq!(group.placement_intent(), Some("placement"));
        assert_eq!(group.release_name(), "g");
        assert_eq!(group.overrides_for("app1"), vec!["replicas=2"]);
        assert!(group.overrides_for("app2").is_empty());
    }
}
