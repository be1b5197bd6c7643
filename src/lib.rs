//! CrewForge - agent run orchestration engine.
//!
//! A meta-agent designs a team of specialized sub-agents for a user goal;
//! the engine executes them in dependency order, one model call per agent,
//! threading outputs forward. Runs support fork-and-edit, ghost shadow
//! runs, pre-step breakpoints with hinted resume, and a post-hoc critic
//! pass, all over a pluggable persistence layer.

pub mod api;
pub mod config;
pub mod cost;
pub mod engine;
pub mod llm;
pub mod store;

pub use config::Config;
pub use engine::{EngineError, ExecuteOptions, ForkSpec, RunEngine};
pub use engine::types::{AgentDefinition, AgentRun, RunStatus};
