//! Run Controller - owns the run lifecycle and the sequential step loop.
//!
//! Operations split into a synchronous validation half (errors surface to
//! the caller, nothing mutated on rejection) and a drive half meant to run
//! in a background task (failures there land on the run document). The run
//! document is persisted after every step and at every status transition,
//! so the completed-step prefix on disk always tells a fresh pass where to
//! start: the same loop serves first execution, fork continuation, resume
//! after a pause, and re-execution after a crash.

use std::sync::Arc;

use uuid::Uuid;

use super::EngineError;
use super::critic::run_critic;
use super::designer::{self, FALLBACK_PROJECT_NAME, TitleGenerator, validate_definitions};
use super::executor::{OutputLedger, StepContext, execute_step};
use super::fork::{ForkSpec, fork_run};
use super::ghost::{ghost_run, promote_ghost};
use super::scheduler;
use super::types::{
    AgentDefinition, AgentRun, Breakpoint, Provider, RunStatus, StepStatus,
};
use crate::llm::{CallerSet, ModelCaller};
use crate::store::{RunStore, now_string};

/// Options for an execute request.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Design the team but stop at `draft` instead of running it.
    pub design_only: bool,
    /// Replace the run's breakpoint list before executing.
    pub breakpoints: Option<Vec<Breakpoint>>,
    /// One-shot prompt edit applied before execution starts.
    pub edited_agent_id: Option<String>,
    pub edited_prompt: Option<String>,
}

/// Central coordinator for agent runs.
pub struct RunEngine {
    store: Arc<dyn RunStore>,
    callers: CallerSet,
    titles: Option<Arc<dyn TitleGenerator>>,
    default_provider: Provider,
    default_model: String,
}

/// Parameters for creating a run.
#[derive(Debug, Clone, Default)]
pub struct CreateRunRequest {
    pub user_goal: String,
    pub project_name: Option<String>,
    pub provider: Option<Provider>,
    pub model: Option<String>,
}

impl RunEngine {
    pub fn new(
        store: Arc<dyn RunStore>,
        callers: CallerSet,
        default_provider: Provider,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            callers,
            titles: None,
            default_provider,
            default_model: default_model.into(),
        }
    }

    /// Enable project title generation at run creation.
    pub fn with_title_generator(mut self, titles: Arc<dyn TitleGenerator>) -> Self {
        self.titles = Some(titles);
        self
    }

    fn caller_for(&self, provider: Provider) -> Result<Arc<dyn ModelCaller>, EngineError> {
        self.callers
            .caller_for(provider)
            .ok_or(EngineError::NoCaller(provider))
    }

    async fn load(&self, id: Uuid) -> Result<AgentRun, EngineError> {
        self.store
            .get_run(id)
            .await
            .map_err(EngineError::Store)?
            .ok_or(EngineError::RunNotFound(id))
    }

    async fn save(&self, run: &mut AgentRun) -> Result<(), EngineError> {
        run.touch();
        self.store.save_run(run).await.map_err(EngineError::Store)
    }

    /// Create a run in `designing`. No model calls except optional title
    /// generation, which is never load-bearing.
    pub async fn create_run(&self, req: CreateRunRequest) -> Result<AgentRun, EngineError> {
        if req.user_goal.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "user_goal must not be empty".to_string(),
            ));
        }
        let provider = req.provider.unwrap_or(self.default_provider);
        let model = req.model.unwrap_or_else(|| self.default_model.clone());
        self.caller_for(provider)?;

        let project_name = match req.project_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None => match &self.titles {
                Some(titles) => titles
                    .generate(&req.user_goal)
                    .await
                    .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string()),
                None => FALLBACK_PROJECT_NAME.to_string(),
            },
        };

        let mut run = AgentRun::new(req.user_goal, project_name, provider, model);
        self.save(&mut run).await?;
        tracing::info!(run_id = %run.id, provider = %run.provider, "Run created");
        Ok(run)
    }

    /// Run the meta-agent design call, leaving the run at `draft`.
    ///
    /// A design failure marks the run `failed` with a diagnostic; that is a
    /// run outcome, not an operation error.
    pub async fn design_run(&self, run_id: Uuid) -> Result<AgentRun, EngineError> {
        let mut run = self.load(run_id).await?;
        if !matches!(run.status, RunStatus::Designing | RunStatus::Draft) {
            return Err(EngineError::InvalidState {
                id: run.id,
                actual: run.status,
                required: "designing or draft",
            });
        }
        let caller = self.caller_for(run.provider)?;

        match designer::design_agents(caller.as_ref(), &run.model, &run.user_goal).await {
            Ok(outcome) => {
                run.agent_definitions = outcome.definitions;
                run.mission_brief = Some(outcome.brief);
                run.reset_steps();
                run.status = RunStatus::Draft;
                tracing::info!(
                    run_id = %run.id,
                    agents = run.agent_definitions.len(),
                    "Design complete"
                );
            }
            Err(e) => {
                tracing::error!(run_id = %run.id, "Design failed: {}", e);
                run.status = RunStatus::Failed;
                run.error = Some(e.to_string());
            }
        }
        self.save(&mut run).await?;
        Ok(run)
    }

    /// Validate and stage an execute request. Rejections happen here, before
    /// any background work, with the run untouched.
    ///
    /// A run persisted as `running` is accepted too: that is a run stranded
    /// by a crash or a store failure mid-loop, and re-driving it is safe
    /// because the loop restarts after the completed-step prefix.
    pub async fn begin_execute(
        &self,
        run_id: Uuid,
        opts: &ExecuteOptions,
    ) -> Result<AgentRun, EngineError> {
        let mut run = self.load(run_id).await?;
        if !matches!(
            run.status,
            RunStatus::Designing | RunStatus::Draft | RunStatus::Running
        ) {
            return Err(EngineError::InvalidState {
                id: run.id,
                actual: run.status,
                required: "designing, draft or running",
            });
        }
        self.caller_for(run.provider)?;

        if let Some(breakpoints) = &opts.breakpoints {
            run.breakpoints = breakpoints.clone();
        }
        if let Some(edited_id) = &opts.edited_agent_id {
            if run.agent_definitions.is_empty() {
                return Err(EngineError::InvalidRequest(
                    "cannot edit an agent before the team is designed".to_string(),
                ));
            }
            let def = run
                .agent_definitions
                .iter_mut()
                .find(|d| &d.id == edited_id)
                .ok_or_else(|| EngineError::AgentNotFound(edited_id.clone()))?;
            if let Some(prompt) = &opts.edited_prompt {
                def.prompt = prompt.clone();
            }
        }

        // Flip to running up front so pollers see the transition immediately;
        // runs that still need a design pass stay in designing until it lands.
        if !opts.design_only && !run.agent_definitions.is_empty() {
            run.status = RunStatus::Running;
        }
        self.save(&mut run).await?;
        Ok(run)
    }

    /// Background half of execute: design if needed, then run the step loop.
    pub async fn drive_execute(
        &self,
        run_id: Uuid,
        design_only: bool,
    ) -> Result<AgentRun, EngineError> {
        let mut run = self.load(run_id).await?;

        if run.agent_definitions.is_empty() {
            run = self.design_run(run_id).await?;
            if run.status != RunStatus::Draft {
                return Ok(run);
            }
            if design_only {
                return Ok(run);
            }
            run.status = RunStatus::Running;
            self.save(&mut run).await?;
        } else if design_only {
            return Ok(run);
        }

        self.run_to_completion(run, false).await
    }

    /// Validate then drive an execute in one call.
    pub async fn execute_run(
        &self,
        run_id: Uuid,
        opts: ExecuteOptions,
    ) -> Result<AgentRun, EngineError> {
        self.begin_execute(run_id, &opts).await?;
        self.drive_execute(run_id, opts.design_only).await
    }

    /// Stage a resume of a paused run, storing the optional hint for the
    /// next step's input.
    pub async fn begin_resume(
        &self,
        run_id: Uuid,
        user_hint: Option<String>,
    ) -> Result<AgentRun, EngineError> {
        let mut run = self.load(run_id).await?;
        if run.status != RunStatus::Paused {
            return Err(EngineError::InvalidState {
                id: run.id,
                actual: run.status,
                required: "paused",
            });
        }
        run.user_hint = user_hint.filter(|h| !h.trim().is_empty());
        run.paused_at_step_index = None;
        run.status = RunStatus::Running;
        self.save(&mut run).await?;
        Ok(run)
    }

    /// Background half of resume. The pass runs to completion without
    /// re-checking breakpoints.
    pub async fn drive_resume(&self, run_id: Uuid) -> Result<AgentRun, EngineError> {
        let run = self.load(run_id).await?;
        self.run_to_completion(run, true).await
    }

    /// Validate then drive a resume in one call.
    pub async fn resume_run(
        &self,
        run_id: Uuid,
        user_hint: Option<String>,
    ) -> Result<AgentRun, EngineError> {
        self.begin_resume(run_id, user_hint).await?;
        self.drive_resume(run_id).await
    }

    /// Replace a draft run's agent definitions wholesale.
    pub async fn update_agent_definitions(
        &self,
        run_id: Uuid,
        definitions: Vec<AgentDefinition>,
    ) -> Result<AgentRun, EngineError> {
        let mut run = self.load(run_id).await?;
        if run.status != RunStatus::Draft {
            return Err(EngineError::InvalidState {
                id: run.id,
                actual: run.status,
                required: "draft",
            });
        }
        validate_definitions(&definitions)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        run.agent_definitions = definitions;
        run.reset_steps();
        self.save(&mut run).await?;
        Ok(run)
    }

    /// Fork a run at a step index, persisting the new draft.
    pub async fn fork(&self, parent_id: Uuid, spec: &ForkSpec) -> Result<AgentRun, EngineError> {
        let parent = self.load(parent_id).await?;
        let mut forked = fork_run(&parent, spec)?;
        self.save(&mut forked).await?;
        tracing::info!(
            parent_id = %parent.id,
            fork_id = %forked.id,
            step = forked.forked_at_step_index,
            "Run forked"
        );
        Ok(forked)
    }

    /// Create a ghost of a run with one agent's prompt replaced.
    pub async fn ghost(
        &self,
        live_id: Uuid,
        agent_id: &str,
        new_prompt: &str,
    ) -> Result<AgentRun, EngineError> {
        let live = self.load(live_id).await?;
        let mut ghost = ghost_run(&live, agent_id, new_prompt)?;
        self.save(&mut ghost).await?;
        tracing::info!(live_id = %live.id, ghost_id = %ghost.id, agent = agent_id, "Ghost created");
        Ok(ghost)
    }

    /// Copy a ghost's agent definitions back onto its live run.
    pub async fn promote(&self, live_id: Uuid, ghost_id: Uuid) -> Result<AgentRun, EngineError> {
        let mut live = self.load(live_id).await?;
        let ghost = self.load(ghost_id).await?;
        promote_ghost(&mut live, &ghost)?;
        self.save(&mut live).await?;
        Ok(live)
    }

    /// Run the critic pass. Critic failures are swallowed: prior results
    /// stay intact and the run is returned as-is.
    pub async fn critic_pass(&self, run_id: Uuid) -> Result<AgentRun, EngineError> {
        let mut run = self.load(run_id).await?;
        let caller = self.caller_for(run.provider)?;
        let model = run.model.clone();
        match run_critic(caller.as_ref(), &model, &mut run).await {
            Ok(()) => self.save(&mut run).await?,
            Err(e) => tracing::warn!(run_id = %run.id, "Critic pass failed: {}", e),
        }
        Ok(run)
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<AgentRun, EngineError> {
        self.load(run_id).await
    }

    pub async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<AgentRun>, EngineError> {
        self.store
            .list_runs(limit, offset)
            .await
            .map_err(EngineError::Store)
    }

    pub async fn delete_run(&self, run_id: Uuid) -> Result<bool, EngineError> {
        self.store
            .delete_run(run_id)
            .await
            .map_err(EngineError::Store)
    }

    /// The sequential step loop.
    ///
    /// Starts after the longest completed prefix in scheduler order, seeding
    /// the output ledger from those steps. On a resume pass breakpoints are
    /// not consulted and the stored hint applies to the first executed step
    /// only.
    async fn run_to_completion(
        &self,
        mut run: AgentRun,
        resume_pass: bool,
    ) -> Result<AgentRun, EngineError> {
        let caller = self.caller_for(run.provider)?;

        if run.steps.len() != run.agent_definitions.len() {
            run.status = RunStatus::Failed;
            run.error = Some("step list out of sync with agent definitions".to_string());
            self.save(&mut run).await?;
            return Ok(run);
        }

        let order = scheduler::schedule(&run.agent_definitions);
        let user_goal = run.user_goal.clone();
        let model = run.model.clone();

        let mut outputs = OutputLedger::new();
        let mut start_pos = order.len();
        for (pos, &def_idx) in order.iter().enumerate() {
            let step = &run.steps[def_idx];
            if step.status == StepStatus::Complete {
                if let Some(output) = &step.output {
                    outputs.record(step.agent_id.clone(), output.clone());
                }
            } else {
                start_pos = pos;
                break;
            }
        }

        let mut pending_hint = if resume_pass { run.user_hint.take() } else { None };

        for pos in start_pos..order.len() {
            let def_idx = order[pos];

            if !resume_pass
                && run.breakpoints.iter().any(|b| b.step_index == pos)
            {
                run.status = RunStatus::Paused;
                run.paused_at_step_index = Some(pos);
                self.save(&mut run).await?;
                tracing::info!(run_id = %run.id, step = pos, "Run paused at breakpoint");
                return Ok(run);
            }

            let def = run.agent_definitions[def_idx].clone();
            let hint = pending_hint.take();

            {
                let step = &mut run.steps[def_idx];
                step.status = StepStatus::Running;
                step.started_at = Some(now_string());
            }
            self.save(&mut run).await?;
            tracing::debug!(run_id = %run.id, agent = %def.id, step = pos, "Step started");

            let ctx = StepContext {
                user_goal: &user_goal,
                user_hint: hint.as_deref(),
                provider: run.provider,
                model: &model,
            };
            match execute_step(caller.as_ref(), ctx, &def, &outputs).await {
                Ok(outcome) => {
                    outputs.record(def.id.clone(), outcome.output.clone());
                    let step = &mut run.steps[def_idx];
                    step.status = StepStatus::Complete;
                    step.input = Some(outcome.input);
                    step.output = Some(outcome.output);
                    step.observation = Some(outcome.observation);
                    step.error = None;
                    step.completed_at = Some(now_string());
                    step.tokens_in = outcome.tokens_in;
                    step.tokens_out = outcome.tokens_out;
                    step.duration_ms = outcome.duration_ms;
                    step.cost_usd = outcome.cost_usd;
                    self.save(&mut run).await?;
                }
                Err(e) => {
                    let message = format!("Agent '{}' failed: {}", def.id, e);
                    tracing::error!(run_id = %run.id, "{}", message);
                    let step = &mut run.steps[def_idx];
                    step.status = StepStatus::Failed;
                    step.error = Some(e.to_string());
                    step.completed_at = Some(now_string());
                    run.status = RunStatus::Failed;
                    run.error = Some(message);
                    self.save(&mut run).await?;
                    return Ok(run);
                }
            }
        }

        // Final output comes from the last agent in scheduler order, which
        // is not necessarily the last element of the step array.
        if let Some(&last_idx) = order.last() {
            run.final_output = run.steps[last_idx].output.as_ref().map(|o| o.to_string());
        }
        run.status = RunStatus::Complete;
        run.paused_at_step_index = None;
        self.save(&mut run).await?;
        tracing::info!(run_id = %run.id, "Run complete");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Breakpoint, StepStatus};
    use crate::llm::testing::ScriptedCaller;
    use crate::llm::ModelReply;
    use crate::store::InMemoryRunStore;
    use serde_json::json;

    const DESIGN_ABC: &str = r#"{"agents": [
        {"id": "research", "prompt": "Gather facts."},
        {"id": "draft", "prompt": "Write a draft.", "dependencies": ["research"]},
        {"id": "polish", "prompt": "Polish the draft.", "input_source": "draft"}
    ],
    "mission_brief": {"summary": "three stage pipeline"}}"#;

    fn engine_with(replies: Vec<Result<ModelReply, String>>) -> (RunEngine, Arc<ScriptedCaller>) {
        let caller = Arc::new(ScriptedCaller::with_replies(replies));
        let callers = CallerSet::new().register(Provider::OpenAi, caller.clone());
        let engine = RunEngine::new(
            Arc::new(InMemoryRunStore::new()),
            callers,
            Provider::OpenAi,
            "gpt-4o",
        );
        (engine, caller)
    }

    fn ok(text: &str) -> Result<ModelReply, String> {
        Ok(ModelReply::text_only(text))
    }

    async fn created(engine: &RunEngine, goal: &str) -> AgentRun {
        engine
            .create_run(CreateRunRequest {
                user_goal: goal.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_pipeline_design_and_execute() {
        let (engine, caller) = engine_with(vec![
            ok(DESIGN_ABC),
            ok(r#"{"output": {"facts": "rain is condensed vapor"}}"#),
            ok(r#"{"output": {"draft_text": "a poem about vapor"}}"#),
            ok(r#"{"output": {"final": "polished rain poem"}}"#),
        ]);
        let run = created(&engine, "write a poem about rain").await;
        assert_eq!(run.status, RunStatus::Designing);

        let done = engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();

        assert_eq!(done.status, RunStatus::Complete);
        assert_eq!(done.agent_definitions.len(), 3);
        assert!(done.steps.iter().all(|s| s.status == StepStatus::Complete));
        assert!(done.final_output.as_ref().unwrap().contains("polished rain poem"));
        assert_eq!(caller.call_count(), 4);

        let calls = caller.calls.lock().unwrap();
        // First step is goal-seeded.
        assert!(calls[1].human_prompt.contains("user_goal"));
        // Second step merges the researcher's output.
        assert!(calls[2].human_prompt.contains("rain is condensed vapor"));
        // Third step sees exactly the drafter's output, not the merge.
        assert!(calls[3].human_prompt.contains("a poem about vapor"));
        assert!(!calls[3].human_prompt.contains("condensed vapor"));
    }

    #[tokio::test]
    async fn test_design_only_stops_at_draft() {
        let (engine, caller) = engine_with(vec![ok(DESIGN_ABC)]);
        let run = created(&engine, "goal").await;

        let drafted = engine
            .execute_run(
                run.id,
                ExecuteOptions {
                    design_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(drafted.status, RunStatus::Draft);
        assert_eq!(drafted.steps.len(), 3);
        assert!(drafted.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(caller.call_count(), 1);
    }

    #[tokio::test]
    async fn test_design_failure_marks_run_failed() {
        let (engine, _) = engine_with(vec![ok("no json, just vibes")]);
        let run = created(&engine, "goal").await;

        let failed = engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.error.as_ref().unwrap().contains("parseable agents array"));
        assert!(failed.steps.is_empty());
    }

    #[tokio::test]
    async fn test_step_failure_is_run_fatal() {
        let (engine, _) = engine_with(vec![
            ok(DESIGN_ABC),
            ok(r#"{"output": {"facts": "x"}}"#),
            Err("rate limited".to_string()),
        ]);
        let run = created(&engine, "goal").await;

        let failed = engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.error.as_ref().unwrap().contains("draft"));
        assert_eq!(failed.steps[0].status, StepStatus::Complete);
        assert_eq!(failed.steps[1].status, StepStatus::Failed);
        // Later steps never execute.
        assert_eq!(failed.steps[2].status, StepStatus::Pending);
        assert!(failed.final_output.is_none());
    }

    #[tokio::test]
    async fn test_breakpoint_pauses_then_resume_with_hint() {
        let (engine, caller) = engine_with(vec![
            ok(DESIGN_ABC),
            ok(r#"{"output": {"facts": "f"}}"#),
            ok(r#"{"output": {"draft_text": "d"}}"#),
            ok(r#"{"output": {"final": "p"}}"#),
        ]);
        let run = created(&engine, "goal").await;

        let paused = engine
            .execute_run(
                run.id,
                ExecuteOptions {
                    breakpoints: Some(vec![Breakpoint::pause_before(1)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(paused.status, RunStatus::Paused);
        assert_eq!(paused.paused_at_step_index, Some(1));
        assert_eq!(paused.steps[0].status, StepStatus::Complete);
        assert_eq!(paused.steps[1].status, StepStatus::Pending);

        let done = engine
            .resume_run(run.id, Some("keep it short".to_string()))
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Complete);
        assert!(done.paused_at_step_index.is_none());
        assert!(done.user_hint.is_none());

        let calls = caller.calls.lock().unwrap();
        // Hint lands in the first resumed step only.
        assert!(calls[2].human_prompt.contains("keep it short"));
        assert!(!calls[3].human_prompt.contains("keep it short"));
        // The resume pass skips the breakpoint it paused on.
        assert_eq!(calls.len(), 4);
    }

    #[tokio::test]
    async fn test_resume_requires_paused() {
        let (engine, _) = engine_with(vec![ok(DESIGN_ABC)]);
        let run = created(&engine, "goal").await;
        let err = engine.resume_run(run.id, None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_fork_reuses_completed_prefix() {
        let (engine, caller) = engine_with(vec![
            ok(DESIGN_ABC),
            ok(r#"{"output": {"facts": "original facts"}}"#),
            ok(r#"{"output": {"draft_text": "original draft"}}"#),
            ok(r#"{"output": {"final": "original final"}}"#),
            ok(r#"{"output": {"draft_text": "reworked draft"}}"#),
            ok(r#"{"output": {"final": "reworked final"}}"#),
        ]);
        let run = created(&engine, "goal").await;
        engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();

        let fork = engine
            .fork(
                run.id,
                &ForkSpec {
                    step_index: 1,
                    edited_agent_id: Some("draft".to_string()),
                    edited_prompt: Some("Write a darker draft.".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(fork.status, RunStatus::Draft);

        let done = engine.execute_run(fork.id, ExecuteOptions::default()).await.unwrap();
        assert_eq!(done.status, RunStatus::Complete);
        assert!(done.final_output.as_ref().unwrap().contains("reworked final"));
        // The research step was carried over, not re-run: 4 + 2 calls total.
        assert_eq!(caller.call_count(), 6);
        assert_eq!(done.steps[0].output, Some(json!({"facts": "original facts"})));

        // The parent run is untouched.
        let parent = engine.get_run(run.id).await.unwrap();
        assert!(parent.final_output.as_ref().unwrap().contains("original final"));
    }

    #[tokio::test]
    async fn test_ghost_reruns_everything_and_promotes() {
        let (engine, caller) = engine_with(vec![
            ok(DESIGN_ABC),
            ok(r#"{"output": {"facts": "f"}}"#),
            ok(r#"{"output": {"draft_text": "d"}}"#),
            ok(r#"{"output": {"final": "live final"}}"#),
            ok(r#"{"output": {"facts": "f2"}}"#),
            ok(r#"{"output": {"draft_text": "d2"}}"#),
            ok(r#"{"output": {"final": "ghost final"}}"#),
        ]);
        let run = created(&engine, "goal").await;
        engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();

        let ghost = engine
            .ghost(run.id, "polish", "Polish with more flair.")
            .await
            .unwrap();
        let done = engine.execute_run(ghost.id, ExecuteOptions::default()).await.unwrap();

        // All three steps re-executed despite the seeded outputs.
        assert_eq!(caller.call_count(), 7);
        assert!(done.final_output.as_ref().unwrap().contains("ghost final"));

        let live = engine.promote(run.id, ghost.id).await.unwrap();
        assert_eq!(live.agent_definitions[2].prompt, "Polish with more flair.");
        // Promotion never touches live history.
        assert!(live.final_output.as_ref().unwrap().contains("live final"));
    }

    #[tokio::test]
    async fn test_update_definitions_requires_draft() {
        let (engine, _) = engine_with(vec![ok(DESIGN_ABC)]);
        let run = created(&engine, "goal").await;

        let defs = vec![AgentDefinition::new("only", "do everything")];
        let err = engine
            .update_agent_definitions(run.id, defs.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));

        engine.design_run(run.id).await.unwrap();
        let updated = engine.update_agent_definitions(run.id, defs).await.unwrap();
        assert_eq!(updated.agent_definitions.len(), 1);
        assert_eq!(updated.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_create_falls_back_to_placeholder_name() {
        let (engine, _) = engine_with(vec![ok("unused")]);
        let run = created(&engine, "goal").await;
        assert_eq!(run.project_name, FALLBACK_PROJECT_NAME);
    }

    #[tokio::test]
    async fn test_create_rejects_unregistered_provider() {
        let (engine, _) = engine_with(vec![ok("unused")]);
        let err = engine
            .create_run(CreateRunRequest {
                user_goal: "goal".to_string(),
                provider: Some(Provider::Anthropic),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoCaller(Provider::Anthropic)));
    }

    #[tokio::test]
    async fn test_stranded_running_run_can_be_redriven() {
        // A crash mid-loop leaves the run persisted as running with a
        // partial completed prefix. Execute must pick it up where it stopped.
        let caller = Arc::new(ScriptedCaller::with_replies(vec![
            ok(r#"{"output": {"draft_text": "recovered draft"}}"#),
            ok(r#"{"output": {"final": "recovered final"}}"#),
        ]));
        let callers = CallerSet::new().register(Provider::OpenAi, caller.clone());
        let store = Arc::new(InMemoryRunStore::new());
        let engine = RunEngine::new(store.clone(), callers, Provider::OpenAi, "gpt-4o");

        let mut run = AgentRun::new("goal", "proj", Provider::OpenAi, "gpt-4o");
        run.agent_definitions = vec![
            AgentDefinition::new("research", "Gather facts."),
            AgentDefinition::new("draft", "Write a draft.").with_dependencies(&["research"]),
            AgentDefinition::new("polish", "Polish the draft.").with_input_source("draft"),
        ];
        run.reset_steps();
        run.steps[0].status = StepStatus::Complete;
        run.steps[0].output = Some(json!({"facts": "pre-crash facts"}));
        run.steps[1].status = StepStatus::Running;
        run.status = RunStatus::Running;
        store.save_run(&run).await.unwrap();

        let done = engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();

        assert_eq!(done.status, RunStatus::Complete);
        assert!(done.final_output.as_ref().unwrap().contains("recovered final"));
        // The completed prefix was reused, only the rest re-executed.
        assert_eq!(done.steps[0].output, Some(json!({"facts": "pre-crash facts"})));
        assert_eq!(caller.call_count(), 2);
        // The interrupted step's output fed the next one.
        let calls = caller.calls.lock().unwrap();
        assert!(calls[0].human_prompt.contains("pre-crash facts"));
        assert!(calls[1].human_prompt.contains("recovered draft"));
    }

    #[tokio::test]
    async fn test_execute_rejects_terminal_run() {
        let (engine, _) = engine_with(vec![ok("no json")]);
        let run = created(&engine, "goal").await;
        engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();

        let err = engine
            .execute_run(run.id, ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_critic_over_completed_run() {
        let (engine, _) = engine_with(vec![
            ok(DESIGN_ABC),
            ok(r#"{"output": {"claim": "the sky is blue"}}"#),
            ok(r#"{"output": {"claim": "the sky is green"}}"#),
            ok(r#"{"output": {"final": "done"}}"#),
            ok(r#"{"contradictions": ["step 2 contradicts step 1 about sky color"], "severity": "medium"}"#),
        ]);
        let run = created(&engine, "goal").await;
        engine.execute_run(run.id, ExecuteOptions::default()).await.unwrap();

        let reviewed = engine.critic_pass(run.id).await.unwrap();
        let first = reviewed.steps[0].critic_result.as_ref().unwrap();
        assert_eq!(first.contradictions.len(), 1);
        assert!(reviewed.steps.iter().all(|s| s.critic_result.is_some()));

        // Results are persisted.
        let loaded = engine.get_run(run.id).await.unwrap();
        assert!(loaded.steps[0].critic_result.is_some());
    }
}
