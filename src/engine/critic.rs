//! Critic Evaluator - post-hoc scan for contradictions across steps.
//!
//! One extra model call over the observations of all completed steps.
//! Below two qualifying steps the critic is a no-op (every step gets a
//! neutral result, no model call). Findings come back as free text and are
//! re-attributed to steps by substring-matching "step N" (1-based) in the
//! finding - intentionally approximate.

use serde::Deserialize;

use super::json_extract::extract_json_object;
use super::types::{AgentRun, CriticResult, Severity, StepStatus};
use crate::llm::ModelCaller;

const CRITIC_PROMPT: &str = "You are a critic reviewing the outputs of a multi-agent run for \
cross-step contradictions: facts asserted by one step and denied by another, \
incompatible numbers, or instructions one step gives that a later step \
ignores. Refer to steps as \"step N\" (1-based). Respond with a single JSON \
object {\"contradictions\": [\"...\"], \"severity\": \"low\"|\"medium\"|\"high\"}. \
An empty contradictions array with severity \"low\" means the run is consistent.";

#[derive(Deserialize)]
struct CriticResponse {
    #[serde(default)]
    contradictions: Vec<String>,
    #[serde(default)]
    severity: Severity,
}

/// Run the critic pass over `run`, writing per-step `critic_result`s.
///
/// Returns `Err` with a diagnostic when the model call or parse fails; the
/// caller is expected to swallow it and leave prior results intact.
pub async fn run_critic(
    caller: &dyn ModelCaller,
    model: &str,
    run: &mut AgentRun,
) -> Result<(), String> {
    let qualifying: Vec<usize> = run
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.status == StepStatus::Complete && (s.output.is_some() || s.observation.is_some())
        })
        .map(|(i, _)| i)
        .collect();

    // Nothing to cross-check against: neutral results, no model call.
    if qualifying.len() < 2 {
        for step in &mut run.steps {
            step.critic_result = Some(CriticResult::neutral());
        }
        run.touch();
        return Ok(());
    }

    let summary = qualifying
        .iter()
        .map(|&i| {
            let step = &run.steps[i];
            let body = step
                .observation
                .clone()
                .or_else(|| step.output.as_ref().map(|o| o.to_string()))
                .unwrap_or_default();
            format!("step {} ({}): {}", i + 1, step.agent_id, body)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let reply = caller
        .invoke(model, &[CRITIC_PROMPT.to_string()], &summary)
        .await
        .map_err(|e| format!("critic model call failed: {}", e))?;

    let value = extract_json_object(&reply.text)
        .ok_or_else(|| "critic response was not a JSON object".to_string())?;
    let parsed: CriticResponse = serde_json::from_value(value)
        .map_err(|e| format!("critic response had unexpected shape: {}", e))?;

    for i in 0..run.steps.len() {
        let marker = format!("step {}", i + 1);
        let matched: Vec<String> = parsed
            .contradictions
            .iter()
            .filter(|c| mentions_step(c, &marker))
            .cloned()
            .collect();
        run.steps[i].critic_result = Some(if matched.is_empty() {
            CriticResult::neutral()
        } else {
            CriticResult {
                contradictions: matched,
                severity: parsed.severity,
                step_index: Some(i),
            }
        });
    }
    run.touch();
    Ok(())
}

/// Whether `text` mentions the step marker as a whole number: "step 1" must
/// not match "step 10".
fn mentions_step(text: &str, marker: &str) -> bool {
    let text = text.to_lowercase();
    let mut from = 0;
    while let Some(pos) = text[from..].find(marker).map(|i| from + i) {
        let next = text[pos + marker.len()..].chars().next();
        if !next.is_some_and(|c| c.is_ascii_digit()) {
            return true;
        }
        from = pos + marker.len();
    }
    false
}
