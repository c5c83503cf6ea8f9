//! Stately Core Library
//!
//! Lifecycle orchestration for long-lived, named stateful components inside
//! one process. Provides the state registry, binding slots, the
//! start/stop/suspend/resume transition engine, substitution with rollback,
//! a dependency report, and process-backed states declared in YAML.

pub mod config;
pub mod deps;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod plan;
pub mod process;
pub mod registry;
pub mod state;
pub mod substitute;
pub mod transition;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, Manifest, ManifestLoader, StateConfig};
pub use deps::{OrderingConflict, StateReport};
pub use error::{
    HardValidationError, LifecycleError, LifecycleValidationError, ProcessError, StatelyError,
    StatelyResult, TransitionError,
};
pub use lifecycle::{Lifecycle, StateContext};
pub use orchestrator::{Orchestrator, Outcome};
pub use plan::StartPlan;
pub use process::{ManagedProcess, ProcessSpec};
pub use registry::StateRegistry;
pub use state::{Binding, RunState, StateMetrics};
pub use substitute::Replacement;
pub use transition::{Direction, Transition};
pub use types::{Instance, StateName};
