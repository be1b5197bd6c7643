//! Agent run orchestration engine.
//!
//! The engine takes a set of agent definitions (each a prompt plus optional
//! input source and dependency list), computes a valid execution order, runs
//! one model call per agent in sequence, persists the run document after
//! every step, and exposes fork / ghost / pause / resume / critic as
//! controlled mutations of that persisted state.

pub mod controller;
pub mod critic;
pub mod designer;
pub mod executor;
pub mod fork;
pub mod ghost;
pub mod json_extract;
pub mod scheduler;
pub mod types;

pub use controller::{CreateRunRequest, ExecuteOptions, RunEngine};
pub use designer::{FALLBACK_PROJECT_NAME, LlmTitleGenerator, TitleGenerator};
pub use fork::ForkSpec;

use thiserror::Error;
use uuid::Uuid;

use types::{Provider, RunStatus};

/// Caller-visible error from a synchronously rejected engine operation.
///
/// These are raised before any state mutation; the run is left untouched.
/// Failures *during* background execution are captured onto the run
/// document instead, since the caller already received an acknowledgement.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Run {0} not found")]
    RunNotFound(Uuid),

    #[error("No model caller registered for provider {0}")]
    NoCaller(Provider),

    #[error("Run {id} is {actual}; operation requires a {required} run")]
    InvalidState {
        id: Uuid,
        actual: RunStatus,
        required: &'static str,
    },

    #[error("Agent '{0}' not found in run")]
    AgentNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(String),
}
