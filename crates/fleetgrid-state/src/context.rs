//! Execution plan ("app context") types.
//!
//! A plan is built in memory by the plan builder and handed to the store,
//! which assigns it an opaque [`ContextId`]. Everything downstream of the
//! builder addresses the plan by that id only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{ClusterRef, CloudLevel, ContextId, DependencyCondition};

/// A resolved unit of placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroup {
    pub clusters: Vec<ClusterRef>,
    pub group_number: u32,
}

/// Output of cluster selector resolution.
///
/// Every mandatory group must receive the workload. Optional groups sharing
/// a group number form an alternation satisfied by at least one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedClusterList {
    pub mandatory: Vec<ClusterGroup>,
    pub optional: Vec<ClusterGroup>,
}

impl ResolvedClusterList {
    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.optional.is_empty()
    }

    pub fn mandatory_clusters(&self) -> impl Iterator<Item = &ClusterRef> {
        self.mandatory.iter().flat_map(|g| g.clusters.iter())
    }

    /// All distinct clusters, mandatory first, in resolution order.
    pub fn clusters(&self) -> Vec<ClusterRef> {
        let mut out: Vec<ClusterRef> = Vec::new();
        for cluster in self
            .mandatory
            .iter()
            .chain(self.optional.iter())
            .flat_map(|g| g.clusters.iter())
        {
            if !out.contains(cluster) {
                out.push(cluster.clone());
            }
        }
        out
    }
}

/// A rendered Kubernetes resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// `{name}+{kind}`-style unique name within the app.
    pub name: String,
    pub kind: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    PreInstall,
    PostInstall,
    PreDelete,
    PostDelete,
}

/// A lifecycle hook extracted from an application's rendered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,
    pub event: HookEvent,
    #[serde(default)]
    pub weight: i32,
    pub content: String,
}

/// Rendered resources of one application on one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterResources {
    pub cluster: ClusterRef,
    pub resources: Vec<ResourceTemplate>,
    /// Resource names in install order.
    pub order: Vec<String>,
}

/// Per-application section of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPlan {
    pub name: String,
    pub namespace: String,
    pub clusters: ResolvedClusterList,
    pub resources: Vec<ClusterResources>,
    pub hooks: Vec<Hook>,
    pub dependency: BTreeMap<String, DependencyCondition>,
}

/// Composite-level metadata of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeMeta {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub release: String,
    pub group: String,
    pub namespace: String,
    pub logical_cloud: String,
    pub level: CloudLevel,
}

/// Plan-wide instructions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanInstructions {
    /// Application install order.
    pub app_order: Vec<String>,
    /// App → (dependency app → condition).
    pub app_dependency: BTreeMap<String, BTreeMap<String, DependencyCondition>>,
}

/// The hierarchical result of one instantiation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub meta: CompositeMeta,
    pub apps: Vec<AppPlan>,
    pub instructions: PlanInstructions,
}

impl ExecutionPlan {
    pub fn app(&self, name: &str) -> Option<&AppPlan> {
        self.apps.iter().find(|a| a.name == name)
    }
}

/// Progress of a persisted plan, written by the orchestrator and the sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Instantiating,
    Instantiated,
    InstantiateFailed,
    Terminating,
    Terminated,
    TerminateFailed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Instantiating => "Instantiating",
            PlanStatus::Instantiated => "Instantiated",
            PlanStatus::InstantiateFailed => "InstantiateFailed",
            PlanStatus::Terminating => "Terminating",
            PlanStatus::Terminated => "Terminated",
            PlanStatus::TerminateFailed => "TerminateFailed",
        };
        f.write_str(s)
    }
}

/// A persisted plan with its runtime flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub context_id: ContextId,
    pub plan: ExecutionPlan,
    pub status: PlanStatus,
    /// Set by a stop request; the sync service halts at the next checkpoint.
    pub stop: bool,
    /// Contexts spawned from this one.
    #[serde(default)]
    pub children: Vec<ContextId>,
    pub created_at: u64,
}
