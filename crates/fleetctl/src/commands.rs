//! Command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use fleetgrid_core::FleetConfig;
use fleetgrid_lifecycle::{
    CleanupQueue, Collaborators, LifecycleError, LifecycleResult, LogSink, Orchestrator,
};
use fleetgrid_state::{GroupKey, LifecycleState, StateStore};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::local::{CatalogClouds, DirectoryRenderer, LocalScheduler, LocalSync};

/// An open store, its catalog and a running cleanup queue.
struct Session {
    orchestrator: Orchestrator,
    queue: CleanupQueue,
}

impl Session {
    fn open(config: &FleetConfig, catalog: &Catalog) -> anyhow::Result<Self> {
        let path = &config.store.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = StateStore::open(path)
            .with_context(|| format!("opening state store {}", path.display()))?;

        let collab = Collaborators {
            clouds: Arc::new(CatalogClouds::new(catalog)),
            labels: Arc::new(catalog.labels()),
            renderer: Arc::new(DirectoryRenderer),
            scheduler: Arc::new(LocalScheduler),
            sync: Arc::new(LocalSync::new(store.clone())),
        };
        let queue = CleanupQueue::start(store.clone(), config.cleanup.clone());
        let orchestrator = Orchestrator::new(store, collab, queue.handle())
            .with_sink(Arc::new(LogSink))
            .with_default_namespace(config.defaults.namespace.clone());
        Ok(Self {
            orchestrator,
            queue,
        })
    }

    /// Open a session over the catalog imported earlier.
    fn load(config: &FleetConfig) -> anyhow::Result<Self> {
        let catalog = Catalog::load_or_default(&catalog_path(config))?;
        Self::open(config, &catalog)
    }

    async fn close(self) {
        self.queue.shutdown().await;
    }
}

fn catalog_path(config: &FleetConfig) -> PathBuf {
    config.store.path.with_file_name("catalog.toml")
}

fn describe(operation: &str, key: &GroupKey, err: LifecycleError) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(format!("{operation} {key} failed ({kind:?})"))
}

fn report(operation: &str, key: &GroupKey, result: LifecycleResult<LifecycleState>) -> anyhow::Result<()> {
    let state = result.map_err(|e| describe(operation, key, e))?;
    match state.actions.last() {
        Some(last) => println!(
            "{key}: {} (revision {}, context {})",
            last.state,
            last.revision,
            last.context_id.as_deref().unwrap_or("-")
        ),
        None => println!("{key}: no actions"),
    }
    Ok(())
}

pub fn init(config_path: &Path, data_dir: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }
    let config = FleetConfig::scaffold(data_dir);
    std::fs::write(config_path, config.to_toml_string()?)?;
    println!("wrote {}", config_path.display());
    Ok(())
}

/// Store the catalog next to the state store, then register its composite
/// apps, profiles, groups and app intents.
pub async fn import(config: &FleetConfig, path: &Path) -> anyhow::Result<()> {
    let catalog = Catalog::import(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    catalog.save(&catalog_path(config))?;

    let session = Session::open(config, &catalog)?;
    let result = register(&session.orchestrator, &catalog).await;
    session.close().await;
    result
}

async fn register(orchestrator: &Orchestrator, catalog: &Catalog) -> anyhow::Result<()> {
    let store = orchestrator.store();
    for app in &catalog.composite_apps {
        store.put_composite_app(app)?;
    }
    for profile in &catalog.profiles {
        store.put_profile(profile)?;
    }

    for group in &catalog.groups {
        let key = group.key();
        if store.get_group(&key)?.is_some() {
            warn!(group = %key, "deployment group exists, skipping");
            continue;
        }
        orchestrator
            .create_group(group.clone())
            .await
            .map_err(|e| describe("create", &key, e))?;
        println!("created {key}");
    }

    for entry in &catalog.app_intents {
        let key = entry.group_key();
        let stored = orchestrator
            .add_app_intent(&key, entry.app_intent())
            .await
            .map_err(|e| describe("add intent to", &key, e))?;
        println!("{key}: intent {} for {}", stored.name, stored.app);
    }

    info!(
        composite_apps = catalog.composite_apps.len(),
        groups = catalog.groups.len(),
        intents = catalog.app_intents.len(),
        "catalog imported"
    );
    Ok(())
}

pub async fn approve(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.approve(key).await;
    session.close().await;
    report("approve", key, result)
}

pub async fn instantiate(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.instantiate(key).await;
    session.close().await;
    report("instantiate", key, result)
}

pub async fn update(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.update(key).await;
    session.close().await;
    report("update", key, result)
}

pub async fn rollback(config: &FleetConfig, key: &GroupKey, revision: u64) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.rollback(key, revision).await;
    session.close().await;
    report("rollback", key, result)
}

pub async fn migrate(config: &FleetConfig, source: &GroupKey, target: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.migrate(source, target).await;
    session.close().await;
    report("migrate", target, result)
}

pub async fn terminate(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.terminate(key).await;
    session.close().await;
    report("terminate", key, result)
}

pub async fn stop(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.stop(key).await;
    session.close().await;
    report("stop", key, result)
}

pub async fn delete(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session.orchestrator.delete_group(key).await;
    session.close().await;
    result.map_err(|e| describe("delete", key, e))?;
    println!("deleted {key}");
    Ok(())
}

pub async fn status(config: &FleetConfig, key: &GroupKey) -> anyhow::Result<()> {
    let session = Session::load(config)?;
    let result = session
        .orchestrator
        .status(key)
        .and_then(|status| Ok((status, session.orchestrator.state(key)?)));
    session.close().await;
    let (status, state) = result.map_err(|e| describe("status of", key, e))?;

    println!("group:      {key}");
    println!("state:      {}", status.state);
    println!("revision:   {}", status.revision);
    println!("context:    {}", status.context_id.as_deref().unwrap_or("-"));
    println!(
        "status ctx: {}",
        status.status_context_id.as_deref().unwrap_or("-")
    );
    match status.plan_status {
        Some(plan) => println!("plan:       {plan}"),
        None => println!("plan:       -"),
    }
    println!("actions:");
    for action in &state.actions {
        println!(
            "  {:>12}  rev {:<3} {:<20} {}",
            action.timestamp,
            action.revision,
            action.state.to_string(),
            action.context_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
