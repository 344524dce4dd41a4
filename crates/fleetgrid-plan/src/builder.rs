//! Execution plan builder.
//!
//! Given a deployment group and its catalog entries, the builder:
//! 1. Checks that the group's logical cloud is instantiated
//! 2. Orders the applications by dependency (cycles abort before rendering)
//! 3. Resolves each application's placement intent to cluster groups
//! 4. Renders each application and attaches resources per target cluster
//! 5. Writes the plan-wide install order and dependency map

use std::collections::BTreeMap;

use fleetgrid_placement::{ClusterLabels, resolve};
use fleetgrid_state::*;
use tracing::{debug, info};

use crate::dependency::check_and_order;
use crate::error::{PlanError, PlanResult};
use crate::render::{RenderRequest, TemplateRenderer};

/// A logical cloud as seen at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCloudView {
    pub cloud: LogicalCloud,
    pub status: LogicalCloudStatus,
    /// Clusters the cloud provides.
    pub clusters: Vec<ClusterRef>,
}

/// Catalog entries one build reads.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub group: &'a DeploymentGroup,
    pub composite: &'a CompositeApp,
    pub profile: Option<&'a CompositeProfile>,
    /// Stored app intents of the group's generic placement intent.
    pub intents: &'a [AppIntent],
    pub cloud: &'a LogicalCloudView,
}

/// Builds execution plans against a renderer and a label service.
pub struct PlanBuilder<'a> {
    renderer: &'a dyn TemplateRenderer,
    labels: &'a dyn ClusterLabels,
    default_namespace: String,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer, labels: &'a dyn ClusterLabels) -> Self {
        Self {
            renderer,
            labels,
            default_namespace: "default".to_string(),
        }
    }

    /// Namespace for admin-level clouds when the group sets none.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Namespace workloads of `group` land in on `cloud`.
    pub fn namespace_for(&self, group: &DeploymentGroup, cloud: &LogicalCloud) -> String {
        match cloud.level {
            CloudLevel::Standard => cloud.namespace.clone(),
            CloudLevel::Admin => group
                .namespace
                .clone()
                .unwrap_or_else(|| self.default_namespace.clone()),
        }
    }

    /// Build a plan. Nothing is persisted; on error the partial plan is dropped.
    pub async fn build(&self, input: PlanInput<'_>) -> PlanResult<ExecutionPlan> {
        let PlanInput {
            group,
            composite,
            profile,
            intents,
            cloud,
        } = input;

        if cloud.status != LogicalCloudStatus::Instantiated {
            return Err(PlanError::LogicalCloudNotReady {
                name: cloud.cloud.name.clone(),
                status: cloud.status,
            });
        }

        let namespace = self.namespace_for(group, &cloud.cloud);
        let order = check_and_order(&composite.apps)?;

        let mut apps = Vec::with_capacity(order.len());
        for name in &order {
            let Some(app) = composite.app(name) else {
                continue;
            };
            apps.push(self.build_app(app, input, &namespace).await?);
        }

        let app_dependency: BTreeMap<String, BTreeMap<String, DependencyCondition>> = composite
            .apps
            .iter()
            .map(|a| (a.name.clone(), a.dependency.clone()))
            .collect();

        let plan = ExecutionPlan {
            meta: CompositeMeta {
                project: group.project.clone(),
                composite_app: group.composite_app.clone(),
                version: group.version.clone(),
                release: group.release_name().to_string(),
                group: group.name.clone(),
                namespace,
                logical_cloud: cloud.cloud.name.clone(),
                level: cloud.cloud.level,
            },
            apps,
            instructions: PlanInstructions {
                app_order: order,
                app_dependency,
            },
        };

        info!(
            group = %group.key(),
            apps = plan.apps.len(),
            "execution plan built"
        );
        Ok(plan)
    }

    async fn build_app(
        &self,
        app: &Application,
        input: PlanInput<'_>,
        namespace: &str,
    ) -> PlanResult<AppPlan> {
        let intent = input
            .intents
            .iter()
            .find(|i| i.app == app.name)
            .map(|i| i.intent.clone())
            .unwrap_or_default();

        let clusters = resolve(&intent, self.labels)
            .await
            .map_err(|source| PlanError::Placement {
                app: app.name.clone(),
                source,
            })?;
        if clusters.is_empty() {
            return Err(PlanError::NoCompatibleClusters {
                app: app.name.clone(),
            });
        }
        if let Some(cluster) = clusters
            .mandatory_clusters()
            .find(|c| !input.cloud.clusters.contains(c))
        {
            return Err(PlanError::ClusterNotInLogicalCloud {
                app: app.name.clone(),
                cluster: cluster.clone(),
                logical_cloud: input.cloud.cloud.name.clone(),
            });
        }

        let request = RenderRequest {
            app: app.name.clone(),
            app_content: app.content.clone(),
            profile_content: input
                .profile
                .and_then(|p| p.app_profiles.get(&app.name).cloned()),
            overrides: input.group.overrides_for(&app.name),
            namespace: namespace.to_string(),
        };
        let rendered = self
            .renderer
            .render(&request)
            .await
            .map_err(|source| PlanError::Render {
                app: app.name.clone(),
                source,
            })?;

        let order: Vec<String> = rendered.templates.iter().map(|t| t.name.clone()).collect();
        let resources = clusters
            .clusters()
            .into_iter()
            .map(|cluster| ClusterResources {
                cluster,
                resources: rendered.templates.clone(),
                order: order.clone(),
            })
            .collect::<Vec<_>>();

        let mut hooks = rendered.hooks;
        hooks.sort_by_key(|h| h.weight);

        debug!(
            app = %app.name,
            clusters = resources.len(),
            templates = order.len(),
            hooks = hooks.len(),
            "application attached to plan"
        );

        Ok(AppPlan {
            name: app.name.clone(),
            namespace: namespace.to_string(),
            clusters,
            resources,
            hooks,
            dependency: app.dependency.clone(),
        })
    }
}
