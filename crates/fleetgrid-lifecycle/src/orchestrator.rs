//! Instantiation orchestrator — drives deployment groups through their
//! lifecycle.
//!
//! Every operation follows the same shape: load the group's action log, gate
//! the operation on its current state, do the work (build a plan, call the
//! scheduler and the sync service), then commit by appending to the log.
//! Nothing is appended when any step fails. A plan persisted by a failed
//! operation is handed to the cleanup queue.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fleetgrid_placement::validate_and_expand;
use fleetgrid_plan::{LogicalCloudView, PlanBuilder, PlanInput};
use fleetgrid_state::*;
use tracing::{debug, info, warn};

use crate::cleanup::CleanupHandle;
use crate::collaborators::{Collaborators, PlanEvent};
use crate::error::{LifecycleError, LifecycleResult};
use crate::observe::{NoopSink, ObservabilitySink};
use crate::state_machine::{Operation, stopped_state};

const TRANSITIONS_METRIC: &str = "fleetgrid_lifecycle_transitions";

/// Snapshot of a deployment group for status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatus {
    pub state: GroupState,
    pub revision: u64,
    pub context_id: Option<ContextId>,
    pub status_context_id: Option<ContextId>,
    /// Status of the current plan, if there is one.
    pub plan_status: Option<PlanStatus>,
    pub actions: usize,
}

/// Lifecycle operations over deployment groups.
pub struct Orchestrator {
    store: StateStore,
    collab: Collaborators,
    cleanup: CleanupHandle,
    sink: Arc<dyn ObservabilitySink>,
    default_namespace: String,
}

impl Orchestrator {
    pub fn new(store: StateStore, collab: Collaborators, cleanup: CleanupHandle) -> Self {
        Self {
            store,
            collab,
            cleanup,
            sink: Arc::new(NoopSink),
            default_namespace: "default".to_string(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Namespace for admin-level logical clouds when a group sets none.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // ── Groups and intents ─────────────────────────────────────────

    /// Create a deployment group and start its log with `Created`.
    pub async fn create_group(&self, group: DeploymentGroup) -> LifecycleResult<LifecycleState> {
        let key = group.key();
        if self
            .store
            .get_composite_app(&group.project, &group.composite_app, &group.version)?
            .is_none()
        {
            return Err(LifecycleError::NotFound {
                what: "composite app",
                key: composite_key(&group.project, &group.composite_app, &group.version),
            });
        }
        if self.store.get_group(&key)?.is_some() {
            return Err(LifecycleError::Validation(format!(
                "deployment group {key} already exists"
            )));
        }
        let placements = group
            .intents
            .iter()
            .filter(|i| i.kind == IntentKind::GenericPlacement)
            .count();
        if placements > 1 {
            return Err(LifecycleError::Validation(format!(
                "deployment group {key} has {placements} generic placement intents"
            )));
        }

        let mut group = group;
        if group.created_at == 0 {
            group.created_at = epoch_secs();
        }
        let state = LifecycleState {
            actions: vec![entry(GroupState::Created, None, 0)],
            status_context_id: None,
        };
        self.store.put_group(&group)?;
        self.store.put_state(&key, &state)?;

        info!(group = %key, "deployment group created");
        self.observe("create", GroupState::Created);
        Ok(state)
    }

    /// Validate an application's placement intent against the group's
    /// logical cloud and store it with label clauses expanded to names.
    pub async fn add_app_intent(
        &self,
        key: &GroupKey,
        mut intent: AppIntent,
    ) -> LifecycleResult<AppIntent> {
        let group = self.load_group(key)?;
        let composite = self.load_composite(&group)?;
        if composite.app(&intent.app).is_none() {
            return Err(LifecycleError::Validation(format!(
                "application '{}' is not part of composite app {}",
                intent.app,
                composite.table_key()
            )));
        }
        match group.placement_intent() {
            Some(name) if name == intent.placement_intent => {}
            _ => {
                return Err(LifecycleError::Validation(format!(
                    "deployment group {key} has no generic placement intent '{}'",
                    intent.placement_intent
                )));
            }
        }

        let clusters = self
            .collab
            .clouds
            .clusters(&group.project, &group.logical_cloud)
            .await
            .map_err(LifecycleError::collaborator("logical cloud lookup"))?;
        validate_and_expand(
            &mut intent.intent,
            &group.logical_cloud,
            &clusters,
            self.collab.labels.as_ref(),
        )
        .await?;

        self.store.put_app_intent(key, &intent)?;
        info!(group = %key, app = %intent.app, selector = ?intent.intent.selector, "app intent stored");
        Ok(intent)
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn state(&self, key: &GroupKey) -> LifecycleResult<LifecycleState> {
        self.store.get_state(key)?.ok_or_else(|| LifecycleError::NotFound {
            what: "deployment group state",
            key: key.to_string(),
        })
    }

    pub fn status(&self, key: &GroupKey) -> LifecycleResult<GroupStatus> {
        let state = self.state(key)?;
        let plan_status = match state.current_context() {
            Some(ctx) => self.store.plan_status(ctx)?,
            None => None,
        };
        Ok(GroupStatus {
            state: current_state(&state)?,
            revision: state.current_revision().unwrap_or(0),
            context_id: state.current_context().map(str::to_string),
            status_context_id: state.status_context_id.clone(),
            plan_status,
            actions: state.actions.len(),
        })
    }

    // ── Lifecycle operations ───────────────────────────────────────

    /// Approve a group. Approving an approved group is a no-op.
    pub async fn approve(&self, key: &GroupKey) -> LifecycleResult<LifecycleState> {
        let state = self.state(key)?;
        let current = current_state(&state)?;
        Operation::Approve.check(current)?;

        if current == GroupState::Approved {
            debug!(group = %key, "already approved");
            return Ok(state);
        }
        if current == GroupState::Terminated {
            if let Some(ctx) = state.current_context() {
                self.require_terminated(ctx)?;
            }
        }

        let revision = state.current_revision().unwrap_or(0);
        let state =
            self.store
                .append_actions(key, vec![entry(GroupState::Approved, None, revision)], None)?;

        info!(group = %key, "deployment group approved");
        self.observe(Operation::Approve.as_str(), GroupState::Approved);
        Ok(state)
    }

    /// Build, schedule and install a fresh plan for an approved group.
    pub async fn instantiate(&self, key: &GroupKey) -> LifecycleResult<LifecycleState> {
        let state = self.state(key)?;
        Operation::Instantiate.check(current_state(&state)?)?;
        let group = self.load_group(key)?;

        let plan = self.build_plan(&group).await?;
        let context_id = self.store.persist_plan(plan)?;

        self.deploy(&context_id, None, "schedule").await?;
        if let Err(e) = self.collab.sync.install(&context_id).await {
            self.cleanup.enqueue(&context_id);
            return Err(LifecycleError::collaborator("sync install")(e));
        }

        let revision = state.last_revision().map_or(0, |r| r + 1);
        let status_context = state
            .status_context_id
            .clone()
            .unwrap_or_else(|| context_id.clone());
        let state = self.store.append_actions(
            key,
            vec![entry(
                GroupState::Instantiated,
                Some(context_id.clone()),
                revision,
            )],
            Some(status_context),
        )?;

        info!(group = %key, %context_id, revision, "deployment group instantiated");
        self.observe(Operation::Instantiate.as_str(), GroupState::Instantiated);
        self.post_event(&context_id, PlanEvent::Instantiate);
        Ok(state)
    }

    /// Replace the running plan with a freshly built one.
    pub async fn update(&self, key: &GroupKey) -> LifecycleResult<LifecycleState> {
        let state = self.state(key)?;
        Operation::Update.check(current_state(&state)?)?;
        let (old_context, old_revision) = live_context(&state, key)?;
        let group = self.load_group(key)?;

        let plan = self.build_plan(&group).await?;
        let context_id = self.store.persist_plan(plan)?;

        self.deploy(&context_id, Some(&old_context), "schedule update")
            .await?;
        if let Err(e) = self.collab.sync.update(&old_context, &context_id).await {
            self.cleanup.enqueue(&context_id);
            return Err(LifecycleError::collaborator("sync update")(e));
        }

        let revision = state.last_revision().map_or(0, |r| r + 1);
        let state = self.store.append_actions(
            key,
            vec![
                entry(GroupState::Updated, Some(old_context.clone()), old_revision),
                entry(
                    GroupState::Instantiated,
                    Some(context_id.clone()),
                    revision,
                ),
            ],
            None,
        )?;

        info!(group = %key, from = %old_context, to = %context_id, revision, "deployment group updated");
        self.observe(Operation::Update.as_str(), GroupState::Instantiated);
        self.post_event(&context_id, PlanEvent::Update);
        Ok(state)
    }

    /// Switch back to the plan recorded at `revision`.
    pub async fn rollback(&self, key: &GroupKey, revision: u64) -> LifecycleResult<LifecycleState> {
        let state = self.state(key)?;
        Operation::Rollback.check(current_state(&state)?)?;
        let (current_context, current_revision) = live_context(&state, key)?;

        if revision == current_revision {
            return Err(LifecycleError::Precondition(format!(
                "deployment group {key} is already at revision {revision}"
            )));
        }
        let target = state
            .context_for_revision(revision)
            .map(str::to_string)
            .ok_or_else(|| {
                LifecycleError::Precondition(format!(
                    "deployment group {key} has no instantiated revision {revision}"
                ))
            })?;

        self.collab
            .sync
            .update(&current_context, &target)
            .await
            .map_err(LifecycleError::collaborator("sync update"))?;

        let next = state.last_revision().map_or(0, |r| r + 1);
        let state = self.store.append_actions(
            key,
            vec![
                entry(
                    GroupState::Updated,
                    Some(current_context.clone()),
                    current_revision,
                ),
                entry(GroupState::Instantiated, Some(target.clone()), next),
            ],
            None,
        )?;

        info!(group = %key, to_revision = revision, context_id = %target, revision = next, "deployment group rolled back");
        self.observe(Operation::Rollback.as_str(), GroupState::Instantiated);
        self.post_event(&target, PlanEvent::Rollback);
        Ok(state)
    }

    /// Move the workload of `source` over to the approved group `target`.
    pub async fn migrate(
        &self,
        source: &GroupKey,
        target: &GroupKey,
    ) -> LifecycleResult<LifecycleState> {
        if source.project != target.project || source.composite_app != target.composite_app {
            return Err(LifecycleError::Validation(format!(
                "cannot migrate {source} to {target}: different project or composite app"
            )));
        }
        if source == target {
            return Err(LifecycleError::Validation(format!(
                "cannot migrate {source} onto itself"
            )));
        }

        let source_state = self.state(source)?;
        Operation::Migrate.check(current_state(&source_state)?)?;
        let target_state = self.state(target)?;
        Operation::MigrateTarget.check(current_state(&target_state)?)?;
        let (source_context, source_revision) = live_context(&source_state, source)?;
        let group = self.load_group(target)?;

        let plan = self.build_plan(&group).await?;
        let context_id = self.store.persist_plan(plan)?;

        self.deploy(&context_id, Some(&source_context), "schedule migration")
            .await?;
        if let Err(e) = self.collab.sync.update(&source_context, &context_id).await {
            self.cleanup.enqueue(&context_id);
            return Err(LifecycleError::collaborator("sync update")(e));
        }

        let revision = target_state.last_revision().map_or(0, |r| r + 1);
        let status_context = source_state
            .status_context_id
            .clone()
            .unwrap_or_else(|| source_context.clone());
        let mut states = self.store.append_to_logs(vec![
            LogAppend {
                key: source.clone(),
                entries: vec![entry(
                    GroupState::Updated,
                    Some(source_context.clone()),
                    source_revision,
                )],
                status_context: None,
            },
            LogAppend {
                key: target.clone(),
                entries: vec![entry(
                    GroupState::Instantiated,
                    Some(context_id.clone()),
                    revision,
                )],
                status_context: Some(status_context),
            },
        ])?;
        let state = states.pop().ok_or_else(|| LifecycleError::NotFound {
            what: "deployment group state",
            key: target.to_string(),
        })?;

        info!(%source, %target, %context_id, revision, "deployment group migrated");
        self.observe(Operation::Migrate.as_str(), GroupState::Instantiated);
        self.post_event(&context_id, PlanEvent::Migrate);
        Ok(state)
    }

    /// Tear down the running plan and its children.
    pub async fn terminate(&self, key: &GroupKey) -> LifecycleResult<LifecycleState> {
        let state = self.state(key)?;
        let current = current_state(&state)?;
        Operation::Terminate.check(current)?;
        let (context_id, revision) = live_context(&state, key)?;

        if current == GroupState::InstantiateStopped {
            self.store.set_stop_flag(&context_id, false)?;
        }
        let children = self
            .store
            .get_plan(&context_id)?
            .map(|r| r.children)
            .unwrap_or_default();

        self.collab
            .scheduler
            .terminate(&context_id)
            .await
            .map_err(LifecycleError::collaborator("scheduler terminate"))?;
        self.store
            .set_plan_status(&context_id, PlanStatus::Terminating)?;
        for child in &children {
            self.collab
                .sync
                .uninstall(child)
                .await
                .map_err(LifecycleError::collaborator("sync uninstall"))?;
        }
        self.collab
            .sync
            .uninstall(&context_id)
            .await
            .map_err(LifecycleError::collaborator("sync uninstall"))?;

        let state = self.store.append_actions(
            key,
            vec![entry(
                GroupState::Terminated,
                Some(context_id.clone()),
                revision,
            )],
            None,
        )?;

        info!(group = %key, %context_id, children = children.len(), "deployment group terminated");
        self.observe(Operation::Terminate.as_str(), GroupState::Terminated);
        self.post_event(&context_id, PlanEvent::Terminate);
        Ok(state)
    }

    /// Ask the sync service to halt an in-flight install or uninstall.
    pub async fn stop(&self, key: &GroupKey) -> LifecycleResult<LifecycleState> {
        let state = self.state(key)?;
        let current = current_state(&state)?;
        Operation::Stop.check(current)?;
        let stopped = stopped_state(current).ok_or(LifecycleError::InvalidState {
            operation: Operation::Stop,
            state: current,
        })?;
        let (context_id, revision) = live_context(&state, key)?;

        let in_flight = match current {
            GroupState::Instantiated => PlanStatus::Instantiating,
            _ => PlanStatus::Terminating,
        };
        let status = self.store.plan_status(&context_id)?;
        if status != Some(in_flight) {
            return Err(LifecycleError::Precondition(format!(
                "plan {context_id} is not {in_flight} (status {})",
                status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
            )));
        }

        self.store.set_stop_flag(&context_id, true)?;
        let state = self.store.append_actions(
            key,
            vec![entry(stopped, Some(context_id.clone()), revision)],
            None,
        )?;

        info!(group = %key, %context_id, state = %stopped, "deployment group stopped");
        self.observe(Operation::Stop.as_str(), stopped);
        Ok(state)
    }

    /// Remove a group that no longer runs anything.
    pub async fn delete_group(&self, key: &GroupKey) -> LifecycleResult<()> {
        let state = self.state(key)?;
        let current = current_state(&state)?;
        Operation::Delete.check(current)?;
        let group = self.load_group(key)?;

        if !group.services.is_empty() {
            return Err(LifecycleError::Precondition(format!(
                "deployment group {key} is attached to services [{}]",
                group.services.join(", ")
            )));
        }

        let mut contexts = state.referenced_contexts();
        if let Some(ctx) = state.current_context() {
            self.require_terminated(ctx)?;
            if let Some(record) = self.store.get_plan(ctx)? {
                for child in &record.children {
                    self.require_terminated(child)?;
                }
                contexts.extend(record.children);
            }
        }

        self.store.delete_group(key)?;
        self.store.delete_state(key)?;
        let intents = self.store.delete_app_intents(key)?;
        for ctx in &contexts {
            self.cleanup.enqueue(ctx);
        }

        info!(group = %key, intents, plans = contexts.len(), "deployment group deleted");
        self.observe(Operation::Delete.as_str(), current);
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────────

    fn load_group(&self, key: &GroupKey) -> LifecycleResult<DeploymentGroup> {
        self.store.get_group(key)?.ok_or_else(|| LifecycleError::NotFound {
            what: "deployment group",
            key: key.to_string(),
        })
    }

    fn load_composite(&self, group: &DeploymentGroup) -> LifecycleResult<CompositeApp> {
        self.store
            .get_composite_app(&group.project, &group.composite_app, &group.version)?
            .ok_or_else(|| LifecycleError::NotFound {
                what: "composite app",
                key: composite_key(&group.project, &group.composite_app, &group.version),
            })
    }

    /// Gather the group's catalog entries and build a plan in memory.
    async fn build_plan(&self, group: &DeploymentGroup) -> LifecycleResult<ExecutionPlan> {
        let composite = self.load_composite(group)?;
        let profile = self
            .store
            .get_profile(
                &group.project,
                &group.composite_app,
                &group.version,
                &group.profile,
            )?
            .ok_or_else(|| LifecycleError::NotFound {
                what: "composite profile",
                key: format!("{}/{}", composite.table_key(), group.profile),
            })?;
        let key = group.key();
        let intents = match group.placement_intent() {
            Some(name) => self.store.list_app_intents(&key, name)?,
            None => Vec::new(),
        };

        let clouds = &self.collab.clouds;
        let cloud = LogicalCloudView {
            cloud: clouds
                .get(&group.project, &group.logical_cloud)
                .await
                .map_err(LifecycleError::collaborator("logical cloud lookup"))?,
            status: clouds
                .status(&group.project, &group.logical_cloud)
                .await
                .map_err(LifecycleError::collaborator("logical cloud status"))?,
            clusters: clouds
                .clusters(&group.project, &group.logical_cloud)
                .await
                .map_err(LifecycleError::collaborator("logical cloud lookup"))?,
        };

        let builder = PlanBuilder::new(self.collab.renderer.as_ref(), self.collab.labels.as_ref())
            .with_default_namespace(self.default_namespace.clone());
        let plan = builder
            .build(PlanInput {
                group,
                composite: &composite,
                profile: Some(&profile),
                intents: &intents,
                cloud: &cloud,
            })
            .await?;
        Ok(plan)
    }

    /// Hand a persisted plan to the scheduler; queue it for cleanup on failure.
    async fn deploy(
        &self,
        context_id: &str,
        predecessor: Option<&str>,
        operation: &'static str,
    ) -> LifecycleResult<()> {
        if let Err(e) = self.collab.scheduler.schedule(context_id, predecessor).await {
            self.cleanup.enqueue(context_id);
            return Err(LifecycleError::collaborator(operation)(e));
        }
        Ok(())
    }

    fn require_terminated(&self, context_id: &str) -> LifecycleResult<()> {
        match self.store.plan_status(context_id)? {
            None | Some(PlanStatus::Terminated) => Ok(()),
            Some(status) => Err(LifecycleError::Precondition(format!(
                "plan {context_id} has not finished terminating (status {status})"
            ))),
        }
    }

    fn observe(&self, operation: &str, state: GroupState) {
        let state = state.to_string();
        self.sink.observe(
            TRANSITIONS_METRIC,
            &[("operation", operation), ("state", &state)],
            1.0,
        );
    }

    /// Fire-and-forget notification; failures are only logged.
    fn post_event(&self, context_id: &str, event: PlanEvent) {
        let scheduler = self.collab.scheduler.clone();
        let context_id = context_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = scheduler.post_event(&context_id, event).await {
                warn!(%context_id, %event, error = %e, "post event failed");
            }
        });
    }
}

fn current_state(state: &LifecycleState) -> LifecycleResult<GroupState> {
    state
        .current_state()
        .ok_or_else(|| LifecycleError::Precondition("action log is empty".to_string()))
}

/// Current context id and revision; errors when the group never ran a plan.
fn live_context(state: &LifecycleState, key: &GroupKey) -> LifecycleResult<(ContextId, u64)> {
    match (state.current_context(), state.current_revision()) {
        (Some(ctx), Some(revision)) => Ok((ctx.to_string(), revision)),
        _ => Err(LifecycleError::Precondition(format!(
            "deployment group {key} has no plan"
        ))),
    }
}

fn entry(state: GroupState, context_id: Option<ContextId>, revision: u64) -> ActionEntry {
    ActionEntry {
        state,
        context_id,
        timestamp: epoch_secs(),
        revision,
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
