//! StateStore — redb-backed state persistence for fleetgrid.
//!
//! Provides typed CRUD operations over the catalog, the lifecycle logs of
//! deployment groups, and the plan arena. All values are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::context::*;
use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

type Table = TableDefinition<'static, &'static str, &'static [u8]>;
type OpenTable<'txn> = redb::Table<'txn, &'static str, &'static [u8]>;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [COMPOSITE_APPS, PROFILES, GROUPS, GROUP_STATES, APP_INTENTS, PLANS] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Composite apps ─────────────────────────────────────────────

    /// Insert or update a composite app.
    pub fn put_composite_app(&self, app: &CompositeApp) -> StateResult<()> {
        let key = app.table_key();
        self.put_value(COMPOSITE_APPS, &key, app)?;
        debug!(%key, "composite app stored");
        Ok(())
    }

    pub fn get_composite_app(
        &self,
        project: &str,
        name: &str,
        version: &str,
    ) -> StateResult<Option<CompositeApp>> {
        self.get_value(COMPOSITE_APPS, &composite_key(project, name, version))
    }

    /// List all versions of all composite apps in a project.
    pub fn list_composite_apps(&self, project: &str) -> StateResult<Vec<CompositeApp>> {
        self.list_prefix(COMPOSITE_APPS, &format!("{project}/"))
    }

    pub fn delete_composite_app(
        &self,
        project: &str,
        name: &str,
        version: &str,
    ) -> StateResult<bool> {
        self.remove_value(COMPOSITE_APPS, &composite_key(project, name, version))
    }

    // ── Profiles ───────────────────────────────────────────────────

    pub fn put_profile(&self, profile: &CompositeProfile) -> StateResult<()> {
        self.put_value(PROFILES, &profile.table_key(), profile)
    }

    pub fn get_profile(
        &self,
        project: &str,
        composite_app: &str,
        version: &str,
        name: &str,
    ) -> StateResult<Option<CompositeProfile>> {
        let key = format!("{}/{name}", composite_key(project, composite_app, version));
        self.get_value(PROFILES, &key)
    }

    // ── Deployment groups ──────────────────────────────────────────

    /// Insert or update a deployment group.
    pub fn put_group(&self, group: &DeploymentGroup) -> StateResult<()> {
        let key = group.key().table_key();
        self.put_value(GROUPS, &key, group)?;
        debug!(%key, "deployment group stored");
        Ok(())
    }

    pub fn get_group(&self, key: &GroupKey) -> StateResult<Option<DeploymentGroup>> {
        self.get_value(GROUPS, &key.table_key())
    }

    /// List all groups of one composite app version.
    pub fn list_groups(
        &self,
        project: &str,
        composite_app: &str,
        version: &str,
    ) -> StateResult<Vec<DeploymentGroup>> {
        let prefix = format!("{}/", composite_key(project, composite_app, version));
        self.list_prefix(GROUPS, &prefix)
    }

    /// Delete a group by key. Returns true if it existed.
    pub fn delete_group(&self, key: &GroupKey) -> StateResult<bool> {
        let existed = self.remove_value(GROUPS, &key.table_key())?;
        debug!(%key, existed, "deployment group deleted");
        Ok(existed)
    }

    // ── Lifecycle logs ─────────────────────────────────────────────

    pub fn put_state(&self, key: &GroupKey, state: &LifecycleState) -> StateResult<()> {
        self.put_value(GROUP_STATES, &key.table_key(), state)
    }

    pub fn get_state(&self, key: &GroupKey) -> StateResult<Option<LifecycleState>> {
        self.get_value(GROUP_STATES, &key.table_key())
    }

    /// Append entries to a group's log in one write transaction.
    ///
    /// When `status_context` is given it replaces the log's status context id.
    pub fn append_actions(
        &self,
        key: &GroupKey,
        entries: Vec<ActionEntry>,
        status_context: Option<ContextId>,
    ) -> StateResult<LifecycleState> {
        let mut states = self.append_to_logs(vec![LogAppend {
            key: key.clone(),
            entries,
            status_context,
        }])?;
        states.pop().ok_or_else(|| StateError::NotFound {
            table: GROUP_STATES.name().to_string(),
            key: key.table_key(),
        })
    }

    /// Append to several logs in one write transaction: either every log is
    /// extended or none is. Returns the new logs in input order.
    pub fn append_to_logs(&self, appends: Vec<LogAppend>) -> StateResult<Vec<LifecycleState>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut states = Vec::with_capacity(appends.len());
        {
            let mut table = txn.open_table(GROUP_STATES).map_err(map_err!(Table))?;
            for append in appends {
                let key = append.key.table_key();
                let count = append.entries.len();
                let state = modify(&mut table, GROUP_STATES.name(), &key, |state: &mut LifecycleState| {
                    state.actions.extend(append.entries);
                    if let Some(ctx) = append.status_context {
                        state.status_context_id = Some(ctx);
                    }
                })?;
                debug!(%key, appended = count, total = state.actions.len(), "lifecycle log extended");
                states.push(state);
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(states)
    }

    pub fn delete_state(&self, key: &GroupKey) -> StateResult<bool> {
        self.remove_value(GROUP_STATES, &key.table_key())
    }

    // ── App intents ────────────────────────────────────────────────

    pub fn put_app_intent(&self, group: &GroupKey, intent: &AppIntent) -> StateResult<()> {
        let key = intent.table_key(group);
        self.put_value(APP_INTENTS, &key, intent)?;
        debug!(%key, "app intent stored");
        Ok(())
    }

    pub fn get_app_intent(
        &self,
        group: &GroupKey,
        placement_intent: &str,
        app: &str,
    ) -> StateResult<Option<AppIntent>> {
        let key = format!("{}/{placement_intent}/{app}", group.table_key());
        self.get_value(APP_INTENTS, &key)
    }

    /// List the app intents under one generic placement intent.
    pub fn list_app_intents(
        &self,
        group: &GroupKey,
        placement_intent: &str,
    ) -> StateResult<Vec<AppIntent>> {
        let prefix = format!("{}/{placement_intent}/", group.table_key());
        self.list_prefix(APP_INTENTS, &prefix)
    }

    /// Delete every app intent of a group. Returns number deleted.
    pub fn delete_app_intents(&self, group: &GroupKey) -> StateResult<u32> {
        self.remove_prefix(APP_INTENTS, &format!("{}/", group.table_key()))
    }

    // ── Plans ──────────────────────────────────────────────────────

    /// Take ownership of a built plan and persist it under a fresh context id.
    pub fn persist_plan(&self, plan: ExecutionPlan) -> StateResult<ContextId> {
        let context_id = uuid::Uuid::new_v4().to_string();
        let record = PlanRecord {
            context_id: context_id.clone(),
            plan,
            status: PlanStatus::Instantiating,
            stop: false,
            children: Vec::new(),
            created_at: epoch_secs(),
        };
        self.put_value(PLANS, &context_id, &record)?;
        debug!(%context_id, "plan persisted");
        Ok(context_id)
    }

    pub fn get_plan(&self, context_id: &str) -> StateResult<Option<PlanRecord>> {
        self.get_value(PLANS, context_id)
    }

    pub fn plan_status(&self, context_id: &str) -> StateResult<Option<PlanStatus>> {
        Ok(self.get_plan(context_id)?.map(|r| r.status))
    }

    pub fn set_plan_status(&self, context_id: &str, status: PlanStatus) -> StateResult<()> {
        self.update_value(PLANS, context_id, |r: &mut PlanRecord| r.status = status)?;
        debug!(%context_id, %status, "plan status updated");
        Ok(())
    }

    pub fn set_stop_flag(&self, context_id: &str, stop: bool) -> StateResult<()> {
        self.update_value(PLANS, context_id, |r: &mut PlanRecord| r.stop = stop)?;
        debug!(%context_id, stop, "plan stop flag updated");
        Ok(())
    }

    /// Record `child` as spawned from `parent`.
    pub fn add_child_context(&self, parent: &str, child: &str) -> StateResult<()> {
        self.update_value(PLANS, parent, |r: &mut PlanRecord| {
            if !r.children.iter().any(|c| c == child) {
                r.children.push(child.to_string());
            }
        })?;
        Ok(())
    }

    /// Delete a plan. Idempotent: returns false if it was already gone.
    pub fn delete_plan(&self, context_id: &str) -> StateResult<bool> {
        let existed = self.remove_value(PLANS, context_id)?;
        debug!(%context_id, existed, "plan deleted");
        Ok(existed)
    }

    // ── Generic table access ───────────────────────────────────────

    fn put_value<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_value<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list_prefix<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let item: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(item);
            }
        }
        Ok(results)
    }

    fn remove_value(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    fn remove_prefix(&self, table: Table, prefix: &str) -> StateResult<u32> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                if key.value().starts_with(prefix) {
                    keys.push(key.value().to_string());
                }
            }
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            count = keys.len() as u32;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(count)
    }

    /// Read-modify-write of one value inside a single write transaction.
    fn update_value<T, F>(&self, table: Table, key: &str, apply: F) -> StateResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let value = {
            let name = table.name().to_string();
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            modify(&mut table, &name, key, apply)?
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(value)
    }
}

/// Decode, change and re-encode the value at `key` in an open table.
fn modify<T, F>(table: &mut OpenTable<'_>, name: &str, key: &str, apply: F) -> StateResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut T),
{
    let current: Option<T> = match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?),
        None => None,
    };
    let mut value = current.ok_or_else(|| StateError::NotFound {
        table: name.to_string(),
        key: key.to_string(),
    })?;
    apply(&mut value);
    let bytes = serde_json::to_vec(&value).map_err(map_err!(Serialize))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(map_err!(Write))?;
    Ok(value)
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn test_composite_app() -> CompositeApp {
        CompositeApp {
            project: "p".to_string(),
            name: "ca".to_string(),
            version: "v1".to_string(),
            description: String::new(),
            apps: vec![Application {
                name: "app1".to_string(),
                description: String::new(),
                content: "./apps/app1".to_string(),
                dependency: BTreeMap::new(),
            }],
        }
    }

    fn test_group(name: &str) -> DeploymentGroup {
        DeploymentGroup {
            project: "p".to_string(),
            composite_app: "ca".to_string(),
            version: "v1".to_string(),
            name: name.to_string(),
            description: String::new(),
            profile: "prof".to_string(),
            logical_cloud: "lc".to_string(),
            namespace: None,
            release: None,
            override_values: Vec::new(),
            intents: vec![IntentRef {
                kind: IntentKind::GenericPlacement,
                name: "placement".to_string(),
            }],
            services: Vec::new(),
            instantiated_services: Vec::new(),
            created_at: 1000,
        }
    }

    fn test_intent(app: &str) -> AppIntent {
        AppIntent {
            name: format!("{app}-intent"),
            placement_intent: "placement".to_string(),
            app: app.to_string(),
            intent: PlacementIntent {
                all_of: vec![AllOfClause::by_name("aws", "edge1")],
                ..Default::default()
            },
        }
    }

    fn test_plan() -> ExecutionPlan {
        ExecutionPlan {
            meta: CompositeMeta {
                project: "p".to_string(),
                composite_app: "ca".to_string(),
                version: "v1".to_string(),
                release: "g".to_string(),
                group: "g".to_string(),
                namespace: "default".to_string(),
                logical_cloud: "lc".to_string(),
                level: CloudLevel::Standard,
            },
            apps: Vec::new(),
            instructions: PlanInstructions::default(),
        }
    }

    fn entry(state: GroupState, revision: u64) -> ActionEntry {
        ActionEntry {
            state,
            context_id: None,
            timestamp: 1000,
            revision,
        }
    }

    // ── Composite apps ─────────────────────────────────────────────

    #[test]
    fn composite_app_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let app = test_composite_app();

        store.put_composite_app(&app).unwrap();
        let retrieved = store.get_composite_app("p", "ca", "v1").unwrap();

        assert_eq!(retrieved, Some(app));
        assert!(store.get_composite_app("p", "ca", "v2").unwrap().is_none());
    }

    #[test]
    fn composite_app_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let mut app = test_composite_app();
        store.put_composite_app(&app).unwrap();
        app.version = "v2".to_string();
        store.put_composite_app(&app).unwrap();

        assert_eq!(store.list_composite_apps("p").unwrap().len(), 2);
        assert!(store.delete_composite_app("p", "ca", "v1").unwrap());
        assert!(!store.delete_composite_app("p", "ca", "v1").unwrap());
        assert_eq!(store.list_composite_apps("p").unwrap().len(), 1);
    }

    #[test]
    fn profile_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let profile = CompositeProfile {
            project: "p".to_string(),
            composite_app: "ca".to_string(),
            version: "v1".to_string(),
            name: "prof".to_string(),
            app_profiles: BTreeMap::from([("app1".to_string(), "./profiles/app1".to_string())]),
        };

        store.put_profile(&profile).unwrap();
        assert_eq!(store.get_profile("p", "ca", "v1", "prof").unwrap(), Some(profile));
    }

    // ── Groups ─────────────────────────────────────────────────────

    #[test]
    fn group_prefix_listing_is_scoped() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_group(&test_group("g")).unwrap();
        store.put_group(&test_group("g2")).unwrap();
        let mut other = test_group("g");
        other.version = "v2".to_string();
        store.put_group(&other).unwrap();

        assert_eq!(store.list_groups("p", "ca", "v1").unwrap().len(), 2);
        assert_eq!(store.list_groups("p", "ca", "v2").unwrap().len(), 1);
    }

    #[test]
    fn group_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let group = test_group("g");
        store.put_group(&group).unwrap();

        assert!(store.delete_group(&group.key()).unwrap());
        assert!(!store.delete_group(&group.key()).unwrap());
        assert!(store.get_group(&group.key()).unwrap().is_none());
    }

    // ── Lifecycle logs ─────────────────────────────────────────────

    #[test]
    fn append_extends_log() {
        let store = StateStore::open_in_memory().unwrap();
        let key = GroupKey::new("p", "ca", "v1", "g");
        store
            .put_state(
                &key,
                &LifecycleState {
                    actions: vec![entry(GroupState::Created, 0)],
                    status_context_id: None,
                },
            )
            .unwrap();

        let state = store
            .append_actions(
                &key,
                vec![entry(GroupState::Approved, 0)],
                Some("ctx".to_string()),
            )
            .unwrap();

        assert_eq!(state.actions.len(), 2);
        assert_eq!(state.status_context_id.as_deref(), Some("ctx"));
        assert_eq!(store.get_state(&key).unwrap(), Some(state));
    }

    #[test]
    fn append_to_missing_log_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let key = GroupKey::new("p", "ca", "v1", "nope");
        let err = store
            .append_actions(&key, vec![entry(GroupState::Approved, 0)], None)
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "no record 'p/ca/v1/nope' in table 'group_states'"
        );
    }

    #[test]
    fn joint_append_is_all_or_nothing() {
        let store = StateStore::open_in_memory().unwrap();
        let source = GroupKey::new("p", "ca", "v1", "g");
        let target = GroupKey::new("p", "ca", "v2", "g");
        let created = LifecycleState {
            actions: vec![entry(GroupState::Created, 0)],
            status_context_id: None,
        };
        store.put_state(&source, &created).unwrap();

        // Target log missing: the source must not be touched either.
        let err = store
            .append_to_logs(vec![
                LogAppend {
                    key: source.clone(),
                    entries: vec![entry(GroupState::Updated, 0)],
                    status_context: None,
                },
                LogAppend {
                    key: target.clone(),
                    entries: vec![entry(GroupState::Instantiated, 0)],
                    status_context: Some("ctx".to_string()),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound { .. }));
        assert_eq!(store.get_state(&source).unwrap(), Some(created.clone()));

        store.put_state(&target, &created).unwrap();
        let states = store
            .append_to_logs(vec![
                LogAppend {
                    key: source.clone(),
                    entries: vec![entry(GroupState::Updated, 0)],
                    status_context: None,
                },
                LogAppend {
                    key: target.clone(),
                    entries: vec![entry(GroupState::Instantiated, 0)],
                    status_context: Some("ctx".to_string()),
                },
            ])
            .unwrap();
        assert_eq!(states[0].current_state(), Some(GroupState::Updated));
        assert_eq!(states[1].status_context_id.as_deref(), Some("ctx"));
        assert_eq!(store.get_state(&target).unwrap(), Some(states[1].clone()));
    }

    // ── App intents ────────────────────────────────────────────────

    #[test]
    fn app_intents_scoped_to_group() {
        let store = StateStore::open_in_memory().unwrap();
        let g = GroupKey::new("p", "ca", "v1", "g");
        let g2 = GroupKey::new("p", "ca", "v1", "g2");
        store.put_app_intent(&g, &test_intent("app1")).unwrap();
        store.put_app_intent(&g, &test_intent("app2")).unwrap();
        store.put_app_intent(&g2, &test_intent("app1")).unwrap();

        assert_eq!(store.list_app_intents(&g, "placement").unwrap().len(), 2);
        assert!(store.get_app_intent(&g, "placement", "app2").unwrap().is_some());

        assert_eq!(store.delete_app_intents(&g).unwrap(), 2);
        assert!(store.list_app_intents(&g, "placement").unwrap().is_empty());
        assert_eq!(store.list_app_intents(&g2, "placement").unwrap().len(), 1);
        assert_eq!(store.delete_app_intents(&g).unwrap(), 0);
        assert_eq!(store.delete_app_intents(&g2).unwrap(), 1);
    }

    // ── Plans ──────────────────────────────────────────────────────

    #[test]
    fn persisted_plans_get_distinct_ids() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store.persist_plan(test_plan()).unwrap();
        let b = store.persist_plan(test_plan()).unwrap();

        assert_ne!(a, b);
        let record = store.get_plan(&a).unwrap().unwrap();
        assert_eq!(record.plan, test_plan());
        assert_eq!(record.status, PlanStatus::Instantiating);
        assert!(!record.stop);
    }

    #[test]
    fn plan_flags_and_children() {
        let store = StateStore::open_in_memory().unwrap();
        let ctx = store.persist_plan(test_plan()).unwrap();

        store.set_plan_status(&ctx, PlanStatus::Instantiated).unwrap();
        store.set_stop_flag(&ctx, true).unwrap();
        store.add_child_context(&ctx, "child-1").unwrap();
        store.add_child_context(&ctx, "child-1").unwrap();

        let record = store.get_plan(&ctx).unwrap().unwrap();
        assert_eq!(record.status, PlanStatus::Instantiated);
        assert!(record.stop);
        assert_eq!(record.children, vec!["child-1".to_string()]);
        assert_eq!(store.plan_status(&ctx).unwrap(), Some(PlanStatus::Instantiated));
    }

    #[test]
    fn plan_delete_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        let ctx = store.persist_plan(test_plan()).unwrap();

        assert!(store.delete_plan(&ctx).unwrap());
        assert!(!store.delete_plan(&ctx).unwrap());
        assert!(store.plan_status(&ctx).unwrap().is_none());
        assert!(matches!(
            store.set_plan_status(&ctx, PlanStatus::Terminated),
            Err(StateError::NotFound { .. })
        ));
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_group(&test_group("g")).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let group = store.get_group(&GroupKey::new("p", "ca", "v1", "g")).unwrap();
        assert!(group.is_some());
        assert_eq!(group.unwrap().logical_cloud, "lc");
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();
        let key = GroupKey::new("p", "ca", "v1", "g");

        assert!(store.list_groups("p", "ca", "v1").unwrap().is_empty());
        assert!(store.get_state(&key).unwrap().is_none());
        assert_eq!(store.delete_app_intents(&key).unwrap(), 0);
        assert!(!store.delete_state(&key).unwrap());
        assert!(!store.delete_plan("nope").unwrap());
    }
}
