pub mod config;

pub use config::{CleanupConfig, DefaultsConfig, FleetConfig, LoggingConfig, StoreConfig};
