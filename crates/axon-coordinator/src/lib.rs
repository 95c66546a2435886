//! Workflow coordination engine for the Axon framework.
//!
//! Drives named, ordered, multi-step workflows across the agents registered
//! on an [`AgentSystem`](axon_core::AgentSystem): per-step timeouts,
//! optional QA validation with best-effort auto-correction, a
//! partial-completion policy, and a background sweep that reclaims stuck
//! executions.
//!
//! # Main types
//!
//! - [`Coordinator`] — Creates, runs, and finalizes workflow executions;
//!   itself an agent answering the canonical coordination events.
//! - [`WorkflowCatalog`] — Static workflow descriptors plus alias synthesis
//!   for unknown names.
//! - [`QaEngine`] — Per-agent output validation and workflow-level
//!   completeness checks.
//! - [`MonitorHandle`] — Controls the stuck-workflow sweep.

/// Workflow descriptors and alias synthesis.
pub mod catalog;
/// The execution engine and its run loop.
pub mod engine;
/// Stuck-workflow sweep.
pub mod monitor;
/// Output validation, criticality classification, and auto-correction.
pub mod qa;
/// Workflow, step, and report types.
pub mod types;

pub use catalog::{WorkflowCatalog, DEFAULT_ACTION, DEFAULT_AGENT};
pub use engine::{Coordinator, CoordinatorConfig, COORDINATOR_AGENT};
pub use monitor::MonitorHandle;
pub use qa::{QaEngine, QaReport, QaThresholds, ValidationRules};
pub use types::{
    ExecutionReceipt, ResultSet, StatusReport, StepReport, StepSpec, StepStatus, WorkflowConfig,
    WorkflowExecution, WorkflowSpec, WorkflowStatus, WorkflowStep,
};
