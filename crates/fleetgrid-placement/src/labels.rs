//! Cluster label lookup.

use std::collections::BTreeMap;

use async_trait::async_trait;

/// Answers which clusters of a provider carry a label.
#[async_trait]
pub trait ClusterLabels: Send + Sync {
    async fn clusters_with_label(&self, provider: &str, label: &str)
    -> anyhow::Result<Vec<String>>;
}

/// In-memory label table.
#[derive(Debug, Clone, Default)]
pub struct StaticLabels {
    labels: BTreeMap<(String, String), Vec<String>>,
}

impl StaticLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`StaticLabels::insert`].
    pub fn with_label(mut self, provider: &str, label: &str, clusters: &[&str]) -> Self {
        for cluster in clusters {
            self.insert(provider, label, cluster);
        }
        self
    }

    pub fn insert(&mut self, provider: &str, label: &str, cluster: &str) {
        let clusters = self
            .labels
            .entry((provider.to_string(), label.to_string()))
            .or_default();
        if !clusters.iter().any(|c| c == cluster) {
            clusters.push(cluster.to_string());
        }
    }
}

#[async_trait]
impl ClusterLabels for StaticLabels {
    async fn clusters_with_label(
        &self,
        provider: &str,
        label: &str,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self
            .labels
            .get(&(provider.to_string(), label.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
