//! Ghost Engine - shadow-run one agent's edited prompt against the same goal.
//!
//! A ghost copies the live run's full agent list with one prompt substituted
//! and seeds its step list from the live run for side-by-side comparison,
//! but forces every step back to pending: a ghost always re-executes
//! everything, unlike a fork. Promotion is the only cross-run mutation in
//! the engine and copies nothing but the agent definitions.

use super::EngineError;
use super::types::{AgentRun, RunStatus, StepStatus};

/// Build a ghost of `live` with `agent_id`'s prompt replaced. Does not
/// persist anything.
pub fn ghost_run(live: &AgentRun, agent_id: &str, new_prompt: &str) -> Result<AgentRun, EngineError> {
    let mut definitions = live.agent_definitions.clone();
    let def = definitions
        .iter_mut()
        .find(|d| d.id == agent_id)
        .ok_or_else(|| EngineError::AgentNotFound(agent_id.to_string()))?;
    def.prompt = new_prompt.to_string();

    let mut run = AgentRun::new(
        live.user_goal.clone(),
        live.project_name.clone(),
        live.provider,
        live.model.clone(),
    );
    run.status = RunStatus::Draft;
    run.agent_definitions = definitions;
    // Seed from the live steps so prior outputs stay visible next to the
    // ghost's fresh ones, but everything re-executes.
    run.steps = live
        .steps
        .iter()
        .map(|step| {
            let mut seeded = step.clone();
            seeded.status = StepStatus::Pending;
            seeded.error = None;
            seeded
        })
        .collect();
    run.mission_brief = live.mission_brief.clone();
    run.ghost_of_run_id = Some(live.id);
    Ok(run)
}

/// Copy the ghost's agent definitions back onto the live run.
///
/// Only valid when the ghost actually belongs to the live run; steps and
/// history on the live run are untouched.
pub fn promote_ghost(live: &mut AgentRun, ghost: &AgentRun) -> Result<(), EngineError> {
    if ghost.ghost_of_run_id != Some(live.id) {
        return Err(EngineError::InvalidRequest(
            "ghost does not belong to the target run".to_string(),
        ));
    }
    live.agent_definitions = ghost.agent_definitions.clone();
    live.touch();
    Ok(())
}
