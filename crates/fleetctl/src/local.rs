//! Local collaborators for running the orchestrator from the command line.
//!
//! - **`CatalogClouds`** — logical clouds read from the imported catalog
//! - **`DirectoryRenderer`** — renders an application from a directory of YAML files
//! - **`LocalScheduler`** / **`LocalSync`** — log every call and move plan
//!   statuses in the store the way a real sync service reports them

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, bail};
use async_trait::async_trait;
use fleetgrid_lifecycle::{LogicalCloudProvider, PlanEvent, Scheduler, SyncService};
use fleetgrid_plan::{RenderRequest, RenderedApp, TemplateRenderer};
use fleetgrid_state::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::catalog::{Catalog, CloudEntry};

// ── Logical clouds ─────────────────────────────────────────────────

pub struct CatalogClouds {
    clouds: Vec<CloudEntry>,
}

impl CatalogClouds {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            clouds: catalog.logical_clouds.clone(),
        }
    }

    fn find(&self, project: &str, name: &str) -> anyhow::Result<&CloudEntry> {
        self.clouds
            .iter()
            .find(|c| c.project == project && c.name == name)
            .with_context(|| format!("logical cloud {project}/{name} is not in the catalog"))
    }
}

#[async_trait]
impl LogicalCloudProvider for CatalogClouds {
    async fn get(&self, project: &str, name: &str) -> anyhow::Result<LogicalCloud> {
        Ok(self.find(project, name)?.logical_cloud())
    }

    async fn clusters(&self, project: &str, name: &str) -> anyhow::Result<Vec<ClusterRef>> {
        Ok(self.find(project, name)?.clusters.clone())
    }

    async fn status(&self, project: &str, name: &str) -> anyhow::Result<LogicalCloudStatus> {
        Ok(self.find(project, name)?.status)
    }
}

// ── Rendering ──────────────────────────────────────────────────────

/// Renders an application from its content directory.
///
/// Every `*.yaml`/`*.yml` file is a resource template, except files under a
/// `hooks/` directory, which are hooks named `<event>-<name>.yaml`. `${key}`
/// placeholders are filled from the profile file (`key=value` lines), then
/// the override values, then `${namespace}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryRenderer;

#[async_trait]
impl TemplateRenderer for DirectoryRenderer {
    async fn render(&self, request: &RenderRequest) -> anyhow::Result<RenderedApp> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || render_directory(&request))
            .await
            .context("render task panicked")?
    }
}

/// Reads and fills every template under the app's content directory.
fn render_directory(request: &RenderRequest) -> anyhow::Result<RenderedApp> {
    let mut values = BTreeMap::new();
    if let Some(profile) = &request.profile_content {
        let content = std::fs::read_to_string(profile)
            .with_context(|| format!("reading profile {profile}"))?;
        values.extend(parse_values(content.lines()));
    }
    values.extend(parse_values(request.overrides.iter().map(String::as_str)));
    values.insert("namespace".to_string(), request.namespace.clone());

    let root = Path::new(&request.app_content);
    if !root.is_dir() {
        bail!("content of {} is not a directory: {}", request.app, root.display());
    }

    let mut rendered = RenderedApp::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_yaml(path) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = substitute(&std::fs::read_to_string(path)?, &values);

        let in_hooks = path
            .strip_prefix(root)
            .ok()
            .and_then(|rel| rel.components().next())
            .is_some_and(|c| c.as_os_str() == "hooks");
        if in_hooks {
            rendered.hooks.push(parse_hook(&stem, content)?);
        } else {
            let kind = resource_kind(&content).unwrap_or_else(|| "Resource".to_string());
            rendered.templates.push(ResourceTemplate {
                name: format!("{stem}+{kind}"),
                kind,
                content,
            });
        }
    }

    debug!(
        app = %request.app,
        templates = rendered.templates.len(),
        hooks = rendered.hooks.len(),
        "application rendered"
    );
    Ok(rendered)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_values<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn substitute(content: &str, values: &BTreeMap<String, String>) -> String {
    values.iter().fold(content.to_string(), |acc, (key, value)| {
        acc.replace(&format!("${{{key}}}"), value)
    })
}

/// First top-level `kind:` of a manifest.
fn resource_kind(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|l| l.strip_prefix("kind:"))
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn parse_hook(stem: &str, content: String) -> anyhow::Result<Hook> {
    const EVENTS: [(&str, HookEvent); 4] = [
        ("pre-install", HookEvent::PreInstall),
        ("post-install", HookEvent::PostInstall),
        ("pre-delete", HookEvent::PreDelete),
        ("post-delete", HookEvent::PostDelete),
    ];
    for (prefix, event) in EVENTS {
        if let Some(rest) = stem.strip_prefix(prefix) {
            let name = rest.trim_start_matches('-');
            return Ok(Hook {
                name: if name.is_empty() { stem.to_string() } else { name.to_string() },
                event,
                weight: 0,
                content,
            });
        }
    }
    bail!("hook file '{stem}' does not start with a hook event")
}

// ── Scheduler and sync ─────────────────────────────────────────────

/// Logs scheduling calls. Holds no store handle: events are posted from
/// detached tasks that may outlive the command.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalScheduler;

#[async_trait]
impl Scheduler for LocalScheduler {
    async fn schedule(&self, context_id: &str, predecessor: Option<&str>) -> anyhow::Result<()> {
        info!(%context_id, ?predecessor, "plan scheduled");
        Ok(())
    }

    async fn terminate(&self, context_id: &str) -> anyhow::Result<()> {
        info!(%context_id, "schedule terminated");
        Ok(())
    }

    async fn post_event(&self, context_id: &str, event: PlanEvent) -> anyhow::Result<()> {
        info!(%context_id, %event, "event posted");
        Ok(())
    }
}

/// Completes every install and uninstall at once, unless the plan is stopped.
pub struct LocalSync {
    store: StateStore,
}

impl LocalSync {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    fn settle(&self, context_id: &str, status: PlanStatus) -> anyhow::Result<()> {
        let record = self
            .store
            .get_plan(context_id)?
            .with_context(|| format!("plan {context_id} not found"))?;
        if record.stop {
            info!(%context_id, "plan stopped, leaving it in flight");
            return Ok(());
        }
        self.store.set_plan_status(context_id, status)?;
        info!(%context_id, %status, "plan settled");
        Ok(())
    }
}

#[async_trait]
impl SyncService for LocalSync {
    async fn install(&self, context_id: &str) -> anyhow::Result<()> {
        self.settle(context_id, PlanStatus::Instantiated)
    }

    async fn update(&self, old_context_id: &str, new_context_id: &str) -> anyhow::Result<()> {
        self.settle(new_context_id, PlanStatus::Instantiated)?;
        if old_context_id != new_context_id {
            self.settle(old_context_id, PlanStatus::Terminated)?;
        }
        Ok(())
    }

    async fn uninstall(&self, context_id: &str) -> anyhow::Result<()> {
        self.settle(context_id, PlanStatus::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn request(dir: &Path, profile: Option<String>) -> RenderRequest {
        RenderRequest {
            app: "app1".to_string(),
            app_content: dir.to_string_lossy().into_owned(),
            profile_content: profile,
            overrides: vec!["replicas=3".to_string()],
            namespace: "lc-ns".to_string(),
        }
    }

    #[tokio::test]
    async fn renders_templates_and_hooks() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "deployment.yaml",
            "kind: Deployment\nnamespace: ${namespace}\nreplicas: ${replicas}\nimage: ${image}\n",
        );
        write(dir.path(), "service.yml", "kind: Service\n");
        write(dir.path(), "README.md", "ignored");
        write(dir.path(), "hooks/pre-install-migrate.yaml", "kind: Job\n");
        write(dir.path(), "profile.values", "image=nginx:1.27\nreplicas=1\n");
        let profile = dir.path().join("profile.values").to_string_lossy().into_owned();

        let rendered = DirectoryRenderer
            .render(&request(dir.path(), Some(profile)))
            .await
            .unwrap();

        let names: Vec<&str> = rendered.templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["deployment+Deployment", "service+Service"]);
        let deployment = &rendered.templates[0].content;
        assert!(deployment.contains("namespace: lc-ns"));
        assert!(deployment.contains("replicas: 3"));
        assert!(deployment.contains("image: nginx:1.27"));

        assert_eq!(rendered.hooks.len(), 1);
        assert_eq!(rendered.hooks[0].name, "migrate");
        assert_eq!(rendered.hooks[0].event, HookEvent::PreInstall);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryRenderer
            .render(&request(&dir.path().join("nope"), None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn renders_apps_concurrently() {
        let web = tempfile::tempdir().unwrap();
        let db = tempfile::tempdir().unwrap();
        write(web.path(), "deploy.yaml", "kind: Deployment\nnamespace: ${namespace}\n");
        write(db.path(), "set.yaml", "kind: StatefulSet\n");
        write(db.path(), "hooks/post-install-seed.yaml", "kind: Job\n");

        let web_request = request(web.path(), None);
        let db_request = request(db.path(), None);
        let (web, db) = tokio::join!(
            DirectoryRenderer.render(&web_request),
            DirectoryRenderer.render(&db_request),
        );

        let web = web.unwrap();
        assert_eq!(web.templates[0].name, "deploy+Deployment");
        assert!(web.templates[0].content.contains("namespace: lc-ns"));
        let db = db.unwrap();
        assert_eq!(db.templates[0].name, "set+StatefulSet");
        assert_eq!(db.hooks[0].event, HookEvent::PostInstall);
    }

    #[test]
    fn hook_names_need_an_event() {
        assert!(parse_hook("cleanup", String::new()).is_err());
        let hook = parse_hook("post-delete", String::new()).unwrap();
        assert_eq!(hook.event, HookEvent::PostDelete);
        assert_eq!(hook.name, "post-delete");
    }

    #[tokio::test]
    async fn stopped_plans_stay_in_flight() {
        let store = StateStore::open_in_memory().unwrap();
        let plan = ExecutionPlan {
            meta: CompositeMeta {
                project: "p".to_string(),
                composite_app: "ca".to_string(),
                version: "v1".to_string(),
                release: "g".to_string(),
                group: "g".to_string(),
                namespace: "lc-ns".to_string(),
                logical_cloud: "lc".to_string(),
                level: CloudLevel::Standard,
            },
            apps: Vec::new(),
            instructions: PlanInstructions::default(),
        };
        let running = store.persist_plan(plan.clone()).unwrap();
        let stopped = store.persist_plan(plan).unwrap();
        store.set_stop_flag(&stopped, true).unwrap();

        let sync = LocalSync::new(store.clone());
        sync.install(&running).await.unwrap();
        sync.install(&stopped).await.unwrap();

        assert_eq!(store.plan_status(&running).unwrap(), Some(PlanStatus::Instantiated));
        assert_eq!(store.plan_status(&stopped).unwrap(), Some(PlanStatus::Instantiating));
        assert!(sync.install("missing").await.is_err());
    }
}
