//! Core types for the Axon agent-coordination framework.
//!
//! This crate provides the foundation shared across all Axon crates: the
//! unified error type, the [`Agent`] contract every addressable component
//! implements, and the [`AgentSystem`] registry that dispatches events
//! between agents by name.
//!
//! # Main types
//!
//! - [`AxonError`] — Unified error enum for all Axon subsystems.
//! - [`AxonResult`] — Convenience alias for `Result<T, AxonError>`.
//! - [`Agent`] — Uniform handle-event contract for addressable agents.
//! - [`AgentInfo`] — Descriptive agent metadata surfaced in health reports.
//! - [`AgentSystem`] — Name-based registry with point-to-point send and
//!   system-wide broadcast.

/// The uniform agent contract and descriptive metadata.
pub mod agent;
/// Agent registry and event dispatch bus.
pub mod system;

pub use agent::{Agent, AgentInfo};
pub use system::AgentSystem;

/// Top-level error type for the Axon framework.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum AxonError {
    /// An error raised by an agent's event handler.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error in workflow resolution or execution bookkeeping.
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// An error in output validation or QA report handling.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`AxonError`].
pub type AxonResult<T> = Result<T, AxonError>;
