//! Template rendering contract.

use async_trait::async_trait;
use fleetgrid_state::{Hook, ResourceTemplate};

/// Everything a renderer needs to expand one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub app: String,
    /// Packaged application content reference.
    pub app_content: String,
    /// Profile content reference for this app, if the profile has one.
    pub profile_content: Option<String>,
    /// `key=value` override strings.
    pub overrides: Vec<String>,
    pub namespace: String,
}

/// Output of rendering one application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedApp {
    pub templates: Vec<ResourceTemplate>,
    pub hooks: Vec<Hook>,
}

/// Turns packaged application content into resource templates and hooks.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> anyhow::Result<RenderedApp>;
}
