//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::types::{AgentDefinition, AgentRun, Breakpoint, Provider, RunStatus};

/// Request to create a run.
#[derive(Debug, Deserialize)]
pub struct CreateRunBody {
    pub user_goal: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Request to execute a run.
#[derive(Debug, Deserialize, Default)]
pub struct ExecuteBody {
    /// Design the team but stop at draft.
    #[serde(default)]
    pub design_only: bool,
    /// Replace the run's breakpoint list before executing.
    #[serde(default)]
    pub breakpoints: Option<Vec<Breakpoint>>,
    /// One-shot prompt edit applied before execution.
    #[serde(default)]
    pub edited_agent_id: Option<String>,
    #[serde(default)]
    pub edited_prompt: Option<String>,
}

/// Request to resume a paused run.
#[derive(Debug, Deserialize, Default)]
pub struct ResumeBody {
    #[serde(default)]
    pub user_hint: Option<String>,
}

/// Request to fork a run.
#[derive(Debug, Deserialize)]
pub struct ForkBody {
    pub step_index: usize,
    #[serde(default)]
    pub edited_agent_id: Option<String>,
    #[serde(default)]
    pub edited_prompt: Option<String>,
}

/// Request to create a ghost.
#[derive(Debug, Deserialize)]
pub struct GhostBody {
    pub agent_id: String,
    pub prompt: String,
}

/// Request to promote a ghost onto its live run.
#[derive(Debug, Deserialize)]
pub struct PromoteBody {
    pub ghost_run_id: Uuid,
}

/// Request to replace a draft run's agent definitions.
#[derive(Debug, Deserialize)]
pub struct UpdateAgentsBody {
    pub agents: Vec<AgentDefinition>,
}

/// Acknowledgement for operations that continue in the background.
#[derive(Debug, Serialize)]
pub struct RunAck {
    pub id: Uuid,
    pub status: RunStatus,
}

impl From<&AgentRun> for RunAck {
    fn from(run: &AgentRun) -> Self {
        Self {
            id: run.id,
            status: run.status,
        }
    }
}

/// Compact run listing entry.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub project_name: String,
    pub status: RunStatus,
    pub provider: Provider,
    pub model: String,
    pub agent_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&AgentRun> for RunSummary {
    fn from(run: &AgentRun) -> Self {
        Self {
            id: run.id,
            project_name: run.project_name.clone(),
            status: run.status,
            provider: run.provider,
            model: run.model.clone(),
            agent_count: run.agent_definitions.len(),
            created_at: run.created_at.clone(),
            updated_at: run.updated_at.clone(),
        }
    }
}

/// Pagination parameters for run listing.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<String>,
    pub store_persistent: bool,
}
