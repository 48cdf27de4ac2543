//! # StepPlan - Hierarchical Plan Execution
//!
//! StepPlan runs plan trees depth-first, one function call at a time,
//! threading each step's result into the next and capturing declared
//! outputs along the way. A partially run plan can be persisted and
//! resumed.
//!
//! ## Features
//!
//! - `core` (default): Plan tree, resolver and executor
//! - `yaml` (default): YAML/JSON persistence of plans and their progress
//! - `logger`: Tracing subscriber setup and run summaries
//! - `detailed-logging`: Debug events for every resolved variable
//! - `full`: All features enabled
//!
//! ## Quick Start
//!
//! ```rust
//! use stepplan::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let shout = NativeFunction::new("text", "shout", |vars: Variables| async move {
//!         Ok(vars.input().to_uppercase())
//!     });
//!     let exclaim = NativeFunction::new("text", "exclaim", |vars: Variables| async move {
//!         Ok(format!("{}!", vars.input()))
//!     });
//!
//!     let mut ctx = ExecutionContext::with_input("hello");
//!     let result = PlanBuilder::new("greet loudly")
//!         .step(shout.shared())
//!         .step(exclaim.shared())
//!         .invoke(&mut ctx)
//!         .await?;
//!
//!     assert_eq!(result.value(), Some("HELLO!"));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export core functionality
pub use stepplan_context as context;
pub use stepplan_core::*;

#[cfg(feature = "yaml")]
#[cfg_attr(docsrs, doc(cfg(feature = "yaml")))]
pub use stepplan_yaml as yaml;

#[cfg(feature = "logger")]
#[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
pub use stepplan_logger as logger;

/// Prelude module for easy imports
pub mod prelude {
    pub use stepplan_context::{CancellationToken, StepStatus};
    pub use stepplan_core::prelude::*;

    #[cfg(feature = "yaml")]
    #[cfg_attr(docsrs, doc(cfg(feature = "yaml")))]
    pub use stepplan_yaml::prelude::*;

    #[cfg(feature = "logger")]
    #[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
    pub use stepplan_logger::Logger;
}
