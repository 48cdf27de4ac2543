//! # StepPlan YAML
//!
//! Plan persistence: YAML/JSON documents that capture a plan tree together
//! with its execution progress, so a partially run plan can be saved and
//! resumed later.

mod config;
mod loader;

pub use config::*;
pub use loader::*;

/// Prelude module for YAML functionality
pub mod prelude {
    pub use crate::{PlanDocument, PlanLoader, PlanNodeConfig};
}
