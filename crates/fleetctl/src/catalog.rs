//! Catalog file — the local stand-in for the services fleetctl has no
//! access to.
//!
//! A catalog describes logical clouds, cluster labels, composite apps,
//! profiles, deployment groups and app intents in one TOML file. `import`
//! copies it next to the state store with content paths made absolute, so
//! later invocations see the same clouds and labels.

use std::path::{Path, PathBuf};

use fleetgrid_placement::StaticLabels;
use fleetgrid_state::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    #[serde(default)]
    pub logical_clouds: Vec<CloudEntry>,
    #[serde(default)]
    pub cluster_labels: Vec<LabelEntry>,
    #[serde(default)]
    pub composite_apps: Vec<CompositeApp>,
    #[serde(default)]
    pub profiles: Vec<CompositeProfile>,
    #[serde(default)]
    pub groups: Vec<DeploymentGroup>,
    #[serde(default)]
    pub app_intents: Vec<IntentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudEntry {
    pub project: String,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub level: CloudLevel,
    #[serde(default = "default_cloud_status")]
    pub status: LogicalCloudStatus,
    #[serde(default)]
    pub clusters: Vec<ClusterRef>,
}

fn default_cloud_status() -> LogicalCloudStatus {
    LogicalCloudStatus::Instantiated
}

impl CloudEntry {
    pub fn logical_cloud(&self) -> LogicalCloud {
        LogicalCloud {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelEntry {
    pub provider: String,
    pub cluster: String,
    pub labels: Vec<String>,
}

/// An app intent plus the group it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentEntry {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub group: String,
    pub name: String,
    pub placement_intent: String,
    pub app: String,
    #[serde(default)]
    pub all_of: Vec<AllOfClause>,
    #[serde(default)]
    pub any_of: Vec<SelectorClause>,
}

impl IntentEntry {
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(&self.project, &self.composite_app, &self.version, &self.group)
    }

    pub fn app_intent(&self) -> AppIntent {
        AppIntent {
            name: self.name.clone(),
            placement_intent: self.placement_intent.clone(),
            app: self.app.clone(),
            intent: PlacementIntent {
                all_of: self.all_of.clone(),
                any_of: self.any_of.clone(),
                selector: SelectorKind::default(),
            },
        }
    }
}

impl Catalog {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Catalog = toml::from_str(&content)?;
        Ok(catalog)
    }

    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Read a catalog and resolve its content paths against its directory.
    pub fn import(path: &Path) -> anyhow::Result<Self> {
        let mut catalog = Self::from_file(path)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let base = std::path::absolute(base)?;
        catalog.resolve_paths(&base);
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for app in self.composite_apps.iter_mut().flat_map(|ca| ca.apps.iter_mut()) {
            app.content = absolute(base, &app.content);
        }
        for content in self
            .profiles
            .iter_mut()
            .flat_map(|p| p.app_profiles.values_mut())
        {
            *content = absolute(base, content);
        }
    }

    pub fn cloud(&self, project: &str, name: &str) -> Option<&CloudEntry> {
        self.logical_clouds
            .iter()
            .find(|c| c.project == project && c.name == name)
    }

    pub fn labels(&self) -> StaticLabels {
        let mut labels = StaticLabels::new();
        for entry in &self.cluster_labels {
            for label in &entry.labels {
                labels.insert(&entry.provider, label, &entry.cluster);
            }
        }
        labels
    }
}

fn absolute(base: &Path, content: &str) -> String {
    let path = Path::new(content);
    if path.is_absolute() {
        content.to_string()
    } else {
        base.join(path).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[logical_clouds]]
project = "p"
name = "lc"
namespace = "lc-ns"
clusters = [
    { provider = "aws", name = "edge1" },
    { provider = "aws", name = "edge2" },
]

[[cluster_labels]]
provider = "aws"
cluster = "edge1"
labels = ["edge", "east"]

[[composite_apps]]
project = "p"
name = "ca"
version = "v1"
apps = [{ name = "app1", content = "apps/app1" }]

[[groups]]
project = "p"
composite_app = "ca"
version = "v1"
name = "g"
profile = "prof"
logical_cloud = "lc"
intents = [{ kind = { type = "generic_placement" }, name = "placement" }]

[[app_intents]]
project = "p"
composite_app = "ca"
version = "v1"
group = "g"
name = "app1-intent"
placement_intent = "placement"
app = "app1"
all_of = [{ provider = "aws", cluster_label = "edge" }]
"#;

    #[test]
    fn parses_catalog() {
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();

        let cloud = catalog.cloud("p", "lc").unwrap();
        assert_eq!(cloud.status, LogicalCloudStatus::Instantiated);
        assert_eq!(cloud.logical_cloud().level, CloudLevel::Standard);
        assert_eq!(cloud.clusters.len(), 2);

        assert_eq!(catalog.groups[0].placement_intent(), Some("placement"));
        let entry = &catalog.app_intents[0];
        assert_eq!(entry.group_key(), GroupKey::new("p", "ca", "v1", "g"));
        assert!(entry.app_intent().intent.uses_labels());
    }

    #[tokio::test]
    async fn labels_from_entries() {
        use fleetgrid_placement::ClusterLabels;

        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        let labels = catalog.labels();
        assert_eq!(
            labels.clusters_with_label("aws", "east").await.unwrap(),
            vec!["edge1"]
        );
    }

    #[test]
    fn import_resolves_content_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = Catalog::import(&path).unwrap();
        let content = &catalog.composite_apps[0].apps[0].content;
        assert!(Path::new(content).is_absolute());
        assert!(content.ends_with("apps/app1"));

        let saved = dir.path().join("state").join("catalog.toml");
        catalog.save(&saved).unwrap();
        assert_eq!(Catalog::load_or_default(&saved).unwrap(), catalog);
    }
}
