//! fleetgrid plan builder — dependency ordering, template rendering and
//! execution plan assembly.
//!
//! The builder produces one in-memory [`ExecutionPlan`] per instantiation
//! attempt. It never persists anything; handing the plan to the store is the
//! caller's job, so a failed build leaves no trace.
//!
//! [`ExecutionPlan`]: fleetgrid_state::ExecutionPlan

pub mod builder;
pub mod dependency;
pub mod error;
pub mod render;

pub use builder::{LogicalCloudView, PlanBuilder, PlanInput};
pub use dependency::check_and_order;
pub use error::{PlanError, PlanResult};
pub use render::{RenderRequest, RenderedApp, TemplateRenderer};
