//! Meta-agent design call.
//!
//! Turns a user goal into a team of agent definitions plus a mission brief.
//! A response that does not yield a parseable `agents` array is a design
//! failure: the run goes to `failed` with a diagnostic carrying a content
//! excerpt, and no steps are created.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::json_extract::extract_json_object;
use super::types::{AgentDefinition, MissionBrief};
use crate::llm::{LlmError, ModelCaller};

const DESIGNER_PROMPT: &str = "You are a meta-agent that designs a team of specialized sub-agents \
to accomplish a user's goal. Respond with a single JSON object:\n\
{\"agents\": [{\"id\": \"...\", \"prompt\": \"...\", \"tools\": [], \
\"input_source\": null, \"next_step\": null, \"dependencies\": []}, ...],\n \
\"mission_brief\": {\"summary\": \"...\", \"inputs\": [], \"stages\": [], \"success_criteria\": []}}\n\
Each agent id must be a short unique snake_case name. Order agents so that \
dependencies come first. Use `dependencies` to declare which agents must \
complete before another starts, and `input_source` only when an agent should \
consume exactly one upstream agent's output.";

/// Placeholder used when title generation fails or is disabled.
pub const FALLBACK_PROJECT_NAME: &str = "Untitled Project";

const EXCERPT_LEN: usize = 200;

/// Design failure. Always run-fatal (the run has no steps to salvage).
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("Meta-agent call failed: {0}")]
    ModelCall(#[from] LlmError),

    #[error("Meta-agent response did not contain a parseable agents array: {excerpt}")]
    Unparseable { excerpt: String },

    #[error("Meta-agent produced invalid agents: {0}")]
    InvalidAgents(String),
}

/// Parsed result of a successful design call.
#[derive(Debug, Clone)]
pub struct DesignOutcome {
    pub definitions: Vec<AgentDefinition>,
    pub brief: MissionBrief,
}

#[derive(Deserialize)]
struct DesignResponse {
    agents: Vec<AgentDefinition>,
    #[serde(default)]
    mission_brief: Option<MissionBrief>,
}

/// Ask the meta-agent to design a team for the goal.
pub async fn design_agents(
    caller: &dyn ModelCaller,
    model: &str,
    user_goal: &str,
) -> Result<DesignOutcome, DesignError> {
    let system_prompts = vec![DESIGNER_PROMPT.to_string()];
    let reply = caller.invoke(model, &system_prompts, user_goal).await?;

    let value = extract_json_object(&reply.text).ok_or_else(|| DesignError::Unparseable {
        excerpt: excerpt(&reply.text),
    })?;
    let response: DesignResponse =
        serde_json::from_value(value).map_err(|_| DesignError::Unparseable {
            excerpt: excerpt(&reply.text),
        })?;

    validate_definitions(&response.agents)?;

    Ok(DesignOutcome {
        definitions: response.agents,
        brief: response.mission_brief.unwrap_or_default(),
    })
}

/// Enforce the run invariant: agent ids non-empty and unique.
pub fn validate_definitions(definitions: &[AgentDefinition]) -> Result<(), DesignError> {
    if definitions.is_empty() {
        return Err(DesignError::InvalidAgents("empty agents array".to_string()));
    }
    let mut seen = std::collections::HashSet::new();
    for def in definitions {
        if def.id.trim().is_empty() {
            return Err(DesignError::InvalidAgents(
                "agent with empty id".to_string(),
            ));
        }
        if !seen.insert(def.id.as_str()) {
            return Err(DesignError::InvalidAgents(format!(
                "duplicate agent id: {}",
                def.id
            )));
        }
    }
    Ok(())
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Optional enrichment: a short project title from the user goal.
/// Never load-bearing; failures fall back to [`FALLBACK_PROJECT_NAME`].
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate(&self, user_goal: &str) -> Option<String>;
}

/// Title generator backed by a model caller.
pub struct LlmTitleGenerator {
    caller: std::sync::Arc<dyn ModelCaller>,
    model: String,
}

impl LlmTitleGenerator {
    pub fn new(caller: std::sync::Arc<dyn ModelCaller>, model: impl Into<String>) -> Self {
        Self {
            caller,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TitleGenerator for LlmTitleGenerator {
    async fn generate(&self, user_goal: &str) -> Option<String> {
        let system = vec![
            "Produce a concise 3-6 word project title for the user's goal. \
             Respond with the title only, no quotes."
                .to_string(),
        ];
        match self.caller.invoke(&self.model, &system, user_goal).await {
            Ok(reply) => {
                let title = reply.text.trim().trim_matches('"').to_string();
                if title.is_empty() { None } else { Some(title) }
            }
            Err(e) => {
                tracing::warn!("Title generation failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedCaller;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_design_happy_path() {
        let caller = ScriptedCaller::always(
            r#"{"agents": [
                {"id": "researcher", "prompt": "Research the topic."},
                {"id": "writer", "prompt": "Write it up.", "dependencies": ["researcher"]}
            ],
            "mission_brief": {"summary": "two stage plan", "stages": ["research", "write"]}}"#,
        );
        let outcome = design_agents(&caller, "gpt-4o", "explain rain").await.unwrap();
        assert_eq!(outcome.definitions.len(), 2);
        assert_eq!(outcome.definitions[1].dependencies, vec!["researcher"]);
        assert_eq!(outcome.brief.summary, "two stage plan");
    }

    #[tokio::test]
    async fn test_design_accepts_fenced_response() {
        let caller = ScriptedCaller::always(
            "Here you go:\n```json\n{\"agents\": [{\"id\": \"solo\", \"prompt\": \"do it\"}]}\n```",
        );
        let outcome = design_agents(&caller, "gpt-4o", "goal").await.unwrap();
        assert_eq!(outcome.definitions[0].id, "solo");
    }

    #[tokio::test]
    async fn test_design_unparseable_includes_excerpt() {
        let caller = ScriptedCaller::always("I refuse to produce JSON today.");
        let err = design_agents(&caller, "gpt-4o", "goal").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("parseable agents array"));
        assert!(msg.contains("I refuse"));
    }

    #[tokio::test]
    async fn test_design_rejects_duplicate_ids() {
        let caller = ScriptedCaller::always(
            r#"{"agents": [{"id": "a", "prompt": "x"}, {"id": "a", "prompt": "y"}]}"#,
        );
        let err = design_agents(&caller, "gpt-4o", "goal").await.unwrap_err();
        assert!(err.to_string().contains("duplicate agent id"));
    }

    #[tokio::test]
    async fn test_design_rejects_empty_id() {
        let caller = ScriptedCaller::always(r#"{"agents": [{"id": "  ", "prompt": "x"}]}"#);
        assert!(design_agents(&caller, "gpt-4o", "goal").await.is_err());
    }

    #[tokio::test]
    async fn test_title_generator_trims() {
        let caller = Arc::new(ScriptedCaller::always("\"Rain Poem Project\"\n"));
        let titles = LlmTitleGenerator::new(caller, "gpt-4o-mini");
        assert_eq!(
            titles.generate("write a poem").await.as_deref(),
            Some("Rain Poem Project")
        );
    }

    #[tokio::test]
    async fn test_title_generator_swallows_errors() {
        let caller = Arc::new(ScriptedCaller::always_failing("down"));
        let titles = LlmTitleGenerator::new(caller, "gpt-4o-mini");
        assert!(titles.generate("goal").await.is_none());
    }
}
