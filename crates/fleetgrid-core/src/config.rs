//! fleetgrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FleetConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path of the redb database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("fleetgrid.redb"),
        }
    }
}

/// Retry policy for the background plan cleanup queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupConfig {
    /// Delivery attempts per queued deletion before it is dropped.
    pub max_attempts: u32,
    /// Base delay between attempts; doubled after every failure.
    pub backoff_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 200,
        }
    }
}

impl CleanupConfig {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,fleetgrid=debug".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    /// Namespace used by admin-level logical clouds when a group sets none.
    pub namespace: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config at `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config rooted at `data_dir`.
    pub fn scaffold(data_dir: &Path) -> Self {
        FleetConfig {
            store: StoreConfig {
                path: data_dir.join("fleetgrid.redb"),
            },
            ..Default::default()
        }
    }
}
