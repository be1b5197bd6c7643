//! Fork Engine - derive a new run from a parent at a chosen step index.
//!
//! Steps before the fork point are carried over verbatim (expected
//! `complete`, outputs intact) so the controller's continuation logic can
//! seed its output ledger from them; steps from the fork point onward are
//! reset to pending. The parent run is never mutated.

use uuid::Uuid;

use super::EngineError;
use super::types::{AgentRun, AgentStep, RunStatus};

/// Parameters for a fork.
#[derive(Debug, Clone, Default)]
pub struct ForkSpec {
    /// Step index to fork at; clamped into `[0, len-1]`.
    pub step_index: usize,
    /// Agent whose prompt to replace in the fork, if any.
    pub edited_agent_id: Option<String>,
    pub edited_prompt: Option<String>,
}

/// Build a new run forked from `parent`. Does not persist anything.
pub fn fork_run(parent: &AgentRun, spec: &ForkSpec) -> Result<AgentRun, EngineError> {
    if parent.steps.is_empty() {
        return Err(EngineError::InvalidRequest(
            "cannot fork a run with no steps".to_string(),
        ));
    }
    let step_index = spec.step_index.min(parent.steps.len() - 1);

    let mut definitions = parent.agent_definitions.clone();
    if let Some(edited_id) = &spec.edited_agent_id {
        let def = definitions
            .iter_mut()
            .find(|d| &d.id == edited_id)
            .ok_or_else(|| EngineError::AgentNotFound(edited_id.clone()))?;
        if let Some(prompt) = &spec.edited_prompt {
            def.prompt = prompt.clone();
        }
    }

    let steps: Vec<AgentStep> = parent
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            if i < step_index {
                step.clone()
            } else {
                AgentStep::pending(&step.agent_id)
            }
        })
        .collect();

    let mut run = AgentRun::new(
        parent.user_goal.clone(),
        parent.project_name.clone(),
        parent.provider,
        parent.model.clone(),
    );
    run.id = Uuid::new_v4();
    run.status = RunStatus::Draft;
    run.agent_definitions = definitions;
    run.steps = steps;
    run.mission_brief = parent.mission_brief.clone();
    run.forked_from_run_id = Some(parent.id);
    run.forked_at_step_index = Some(step_index);
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{AgentDefinition, Provider, StepStatus};
    use serde_json::json;

    fn parent() -> AgentRun {
        let mut run = AgentRun::new("goal", "proj", Provider::OpenAi, "gpt-4o");
        run.agent_definitions = vec![
            AgentDefinition::new("a", "prompt a"),
            AgentDefinition::new("b", "prompt b").with_dependencies(&["a"]),
            AgentDefinition::new("c", "prompt c").with_input_source("b"),
        ];
        run.reset_steps();
        for (i, step) in run.steps.iter_mut().enumerate() {
            step.status = StepStatus::Complete;
            step.output = Some(json!({"n": i}));
            step.observation = Some(format!("{{\"n\":{i}}}"));
        }
        run.status = RunStatus::Complete;
        run
    }

    #[test]
    fn test_fork_preserves_prefix_and_resets_suffix() {
        let parent = parent();
        let fork = fork_run(
            &parent,
            &ForkSpec {
                step_index: 2,
                ..Default::default()
            },
        )
        .unwrap();

        // Prefix deep-equal to the parent's steps.
        assert_eq!(fork.steps[0], parent.steps[0]);
        assert_eq!(fork.steps[1], parent.steps[1]);
        // Suffix reset with no output.
        assert_eq!(fork.steps[2].status, StepStatus::Pending);
        assert!(fork.steps[2].output.is_none());

        assert_eq!(fork.forked_from_run_id, Some(parent.id));
        assert_eq!(fork.forked_at_step_index, Some(2));
        assert_ne!(fork.id, parent.id);
        assert_eq!(fork.status, RunStatus::Draft);
    }

    #[test]
    fn test_fork_at_zero_resets_everything() {
        let fork = fork_run(&parent(), &ForkSpec::default()).unwrap();
        assert!(fork.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert!(fork.steps.iter().all(|s| s.output.is_none()));
    }

    #[test]
    fn test_fork_index_clamped() {
        let fork = fork_run(
            &parent(),
            &ForkSpec {
                step_index: 99,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(fork.forked_at_step_index, Some(2));
        // The last step is still re-executed.
        assert_eq!(fork.steps[2].status, StepStatus::Pending);
        assert_eq!(fork.steps[1].status, StepStatus::Complete);
    }

    #[test]
    fn test_fork_with_prompt_edit() {
        let fork = fork_run(
            &parent(),
            &ForkSpec {
                step_index: 1,
                edited_agent_id: Some("b".to_string()),
                edited_prompt: Some("new prompt".to_string()),
            },
        )
        .unwrap();
        assert_eq!(fork.agent_definitions[1].prompt, "new prompt");
        assert_eq!(fork.agent_definitions[0].prompt, "prompt a");
    }

    #[test]
    fn test_fork_unknown_agent_rejected() {
        let err = fork_run(
            &parent(),
            &ForkSpec {
                step_index: 1,
                edited_agent_id: Some("zz".to_string()),
                edited_prompt: Some("x".to_string()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::AgentNotFound(_)));
    }

    #[test]
    fn test_fork_empty_run_rejected() {
        let empty = AgentRun::new("goal", "proj", Provider::OpenAi, "gpt-4o");
        let err = fork_run(&empty, &ForkSpec::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[test]
    fn test_fork_does_not_mutate_parent() {
        let parent_run = parent();
        let before = parent_run.clone();
        let _ = fork_run(
            &parent_run,
            &ForkSpec {
                step_index: 1,
                edited_agent_id: Some("a".to_string()),
                edited_prompt: Some("x".to_string()),
            },
        )
        .unwrap();
        assert_eq!(parent_run.agent_definitions, before.agent_definitions);
        assert_eq!(parent_run.steps, before.steps);
    }
}
