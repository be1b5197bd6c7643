//! Core types for agent runs.
//!
//! An [`AgentRun`] is the aggregate root: it owns an ordered list of
//! [`AgentDefinition`]s and a step list that is always index-aligned 1:1
//! with it (both are mutated together, never separately).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One specialist agent designed for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDefinition {
    /// Unique within a run's agent list. Must be non-empty.
    pub id: String,
    /// Instructions given to the model for this agent's step.
    pub prompt: String,
    /// Advisory tool list. Not enforced by the engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Id of the single upstream agent whose output becomes this agent's
    /// entire input. Takes priority over dependency merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_source: Option<String>,
    /// Advisory forward pointer, used only for visualization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    /// Ids that must complete before this agent runs. Drives ordering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl AgentDefinition {
    /// Create a minimal definition (mostly for tests).
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            tools: Vec::new(),
            input_source: None,
            next_step: None,
            dependencies: Vec::new(),
        }
    }

    /// Add dependency ids.
    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Set the explicit input source.
    pub fn with_input_source(mut self, source: impl Into<String>) -> Self {
        self.input_source = Some(source.into());
        self
    }
}

/// Per-step execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Execution record for one agent within one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStep {
    /// Id of the agent definition this step executes.
    pub agent_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Truncated stringified output (max 500 chars) for human/critic review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    #[serde(default)]
    pub duration_ms: u64,
    /// Advisory telemetry, never used for control flow.
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_result: Option<CriticResult>,
}

impl AgentStep {
    /// Create a fresh pending step for an agent.
    pub fn pending(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: StepStatus::Pending,
            input: None,
            output: None,
            observation: None,
            error: None,
            started_at: None,
            completed_at: None,
            tokens_in: 0,
            tokens_out: 0,
            duration_ms: 0,
            cost_usd: 0.0,
            critic_result: None,
        }
    }

    /// Reset this step back to pending, discarding outputs and telemetry.
    pub fn reset(&mut self) {
        *self = Self::pending(self.agent_id.clone());
    }
}

/// Severity of a critic finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Result of the critic pass for one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticResult {
    /// Free-text findings, in the order the critic reported them.
    pub contradictions: Vec<String>,
    pub severity: Severity,
    /// Step index a finding was attributed to, when the attribution matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
}

impl CriticResult {
    /// Neutral result used when the critic has nothing to say about a step.
    pub fn neutral() -> Self {
        Self {
            contradictions: Vec::new(),
            severity: Severity::Low,
            step_index: None,
        }
    }
}

/// Kind of breakpoint. Only pre-step pauses exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    PauseBeforeStep,
}

/// A declared pause point, consulted before each step executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    #[serde(rename = "type")]
    pub kind: BreakpointKind,
    pub step_index: usize,
}

impl Breakpoint {
    /// Pause before the given step index (position in scheduler order).
    pub fn pause_before(step_index: usize) -> Self {
        Self {
            kind: BreakpointKind::PauseBeforeStep,
            step_index,
        }
    }
}

/// Top-level run status.
///
/// `Complete` and `Failed` are terminal; `Paused` is suspended-resumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Designing,
    Draft,
    Running,
    Complete,
    Failed,
    Paused,
}

impl RunStatus {
    /// Whether the run can never execute another step.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Designing => write!(f, "designing"),
            Self::Draft => write!(f, "draft"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Descriptive plan metadata produced at design time. Informational only;
/// never consumed by execution logic.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MissionBrief {
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<String>,
}

/// Model provider profile, fixed per run at creation/resume time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
    Google,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// One end-to-end execution attempt for a user goal (the aggregate root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: Uuid,
    pub user_goal: String,
    pub project_name: String,
    pub status: RunStatus,
    pub provider: Provider,
    pub model: String,
    #[serde(default)]
    pub agent_definitions: Vec<AgentDefinition>,
    #[serde(default)]
    pub steps: Vec<AgentStep>,
    /// Stringified JSON of the terminal agent's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_brief: Option<MissionBrief>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakpoints: Vec<Breakpoint>,
    /// Position in scheduler order where a breakpoint paused the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at_step_index: Option<usize>,
    /// Free text injected into the next step's input on resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from_run_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_at_step_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_of_run_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

impl AgentRun {
    /// Create a run in `designing` with no agents yet.
    pub fn new(
        user_goal: impl Into<String>,
        project_name: impl Into<String>,
        provider: Provider,
        model: impl Into<String>,
    ) -> Self {
        let now = crate::store::now_string();
        Self {
            id: Uuid::new_v4(),
            user_goal: user_goal.into(),
            project_name: project_name.into(),
            status: RunStatus::Designing,
            provider,
            model: model.into(),
            agent_definitions: Vec::new(),
            steps: Vec::new(),
            final_output: None,
            error: None,
            mission_brief: None,
            breakpoints: Vec::new(),
            paused_at_step_index: None,
            user_hint: None,
            forked_from_run_id: None,
            forked_at_step_index: None,
            ghost_of_run_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Rebuild the step list as pending steps, one per definition, in
    /// definition order. Keeps the step list index-aligned.
    pub fn reset_steps(&mut self) {
        self.steps = self
            .agent_definitions
            .iter()
            .map(|d| AgentStep::pending(&d.id))
            .collect();
    }

    /// Stamp `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = crate::store::now_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", RunStatus::Designing), "designing");
        assert_eq!(format!("{}", RunStatus::Paused), "paused");
        assert_eq!(format!("{}", StepStatus::Complete), "complete");
        assert_eq!(format!("{}", Severity::High), "high");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RunStatus::Complete.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_reset_steps_stays_index_aligned() {
        let mut run = AgentRun::new("goal", "proj", Provider::OpenAi, "gpt-4o");
        run.agent_definitions = vec![
            AgentDefinition::new("a", "p1"),
            AgentDefinition::new("b", "p2"),
        ];
        run.reset_steps();
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].agent_id, "a");
        assert_eq!(run.steps[1].agent_id, "b");
        assert!(run.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_breakpoint_serde_shape() {
        let bp = Breakpoint::pause_before(2);
        let json = serde_json::to_value(bp).unwrap();
        assert_eq!(json["type"], "pause_before_step");
        assert_eq!(json["step_index"], 2);
    }

    #[test]
    fn test_step_reset_clears_everything() {
        let mut step = AgentStep::pending("x");
        step.status = StepStatus::Complete;
        step.output = Some(serde_json::json!({"k": 1}));
        step.tokens_in = 42;
        step.reset();
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.output.is_none());
        assert_eq!(step.tokens_in, 0);
        assert_eq!(step.agent_id, "x");
    }
}
