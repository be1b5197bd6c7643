//! Step Executor - drives one agent definition to completion.
//!
//! Builds the step's input payload from prior outputs, invokes the model
//! caller, extracts the output object, and records timing and cost. A
//! transport-level model error is returned to the controller and is
//! run-fatal; an output that fails to parse is *not* an error - the raw
//! text is wrapped and execution proceeds.

use std::time::Instant;

use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::OnceLock;

use super::json_extract::{balanced_end, extract_json_object};
use super::types::{AgentDefinition, Provider};
use crate::cost::estimate_cost_usd;
use crate::llm::{LlmError, ModelCaller};

/// Fixed supervisor framing prepended to every agent's own prompt.
const SUPERVISOR_PROMPT: &str = "You are one specialist agent inside a supervised multi-agent run. \
Complete only your own role. Respond with a single JSON object of the form \
{\"output\": {...}} where the inner object carries your result. \
Do not include any other top-level keys.";

/// Reserved payload key for the user's mid-run hint.
pub const USER_HINT_KEY: &str = "user_hint";

/// Maximum observation length in characters.
const OBSERVATION_MAX_CHARS: usize = 500;

/// How a step's input payload is sourced. Resolved once per step, in
/// priority order, instead of being inferred from map emptiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    /// The entire input is one upstream agent's output.
    ExplicitSource(String),
    /// Shallow merge of every prior agent's output (later keys win).
    FullMerge,
    /// No output exists yet; seed from the user goal.
    GoalSeed,
}

/// Ordered accumulator of agent outputs, in execution order.
///
/// Insertion order matters: `FullMerge` applies outputs in the order the
/// agents ran, so keys from later agents win on collision.
#[derive(Debug, Clone, Default)]
pub struct OutputLedger {
    entries: Vec<(String, Value)>,
}

impl OutputLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an agent's output, replacing any previous entry for the id.
    pub fn record(&mut self, agent_id: impl Into<String>, output: Value) {
        let agent_id = agent_id.into();
        if let Some(entry) = self.entries.iter_mut().find(|(id, _)| *id == agent_id) {
            entry.1 = output;
        } else {
            self.entries.push((agent_id, output));
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow merge of all recorded outputs, in execution order.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for (_, output) in &self.entries {
            if let Some(obj) = output.as_object() {
                for (k, v) in obj {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
        merged
    }
}

/// Resolve where this step's input comes from.
pub fn resolve_input_spec(def: &AgentDefinition, outputs: &OutputLedger) -> InputSpec {
    if let Some(source) = &def.input_source {
        if outputs.get(source).is_some() {
            return InputSpec::ExplicitSource(source.clone());
        }
    }
    if outputs.is_empty() {
        InputSpec::GoalSeed
    } else {
        InputSpec::FullMerge
    }
}

/// Build the input payload for a step.
pub fn build_input(
    def: &AgentDefinition,
    outputs: &OutputLedger,
    user_goal: &str,
    user_hint: Option<&str>,
) -> Value {
    let mut payload = match resolve_input_spec(def, outputs) {
        InputSpec::ExplicitSource(source) => {
            let value = outputs.get(&source).cloned().unwrap_or(Value::Null);
            match value {
                Value::Object(map) => map,
                other => {
                    // Non-object outputs still flow through under one key.
                    let mut map = Map::new();
                    map.insert("input".to_string(), other);
                    map
                }
            }
        }
        InputSpec::GoalSeed => {
            let mut map = Map::new();
            map.insert("user_goal".to_string(), Value::String(user_goal.to_string()));
            map
        }
        InputSpec::FullMerge => outputs.merged(),
    };

    if let Some(hint) = user_hint {
        payload.insert(USER_HINT_KEY.to_string(), Value::String(hint.to_string()));
    }
    Value::Object(payload)
}

/// Everything recorded about a successfully executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub input: Value,
    pub output: Value,
    pub observation: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub duration_ms: u64,
    pub cost_usd: f64,
}

/// Context shared by every step of one run.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub user_goal: &'a str,
    pub user_hint: Option<&'a str>,
    pub provider: Provider,
    pub model: &'a str,
}

/// Execute one agent definition against the model caller.
pub async fn execute_step(
    caller: &dyn ModelCaller,
    ctx: StepContext<'_>,
    def: &AgentDefinition,
    outputs: &OutputLedger,
) -> Result<StepOutcome, LlmError> {
    let input = build_input(def, outputs, ctx.user_goal, ctx.user_hint);

    let mut system_prompts = vec![SUPERVISOR_PROMPT.to_string(), def.prompt.clone()];
    if ctx.user_hint.is_some() {
        system_prompts.push(format!(
            "The input payload carries a `{USER_HINT_KEY}` field with direct guidance \
             from the user. Follow it even where it overrides your role instructions."
        ));
    }
    let human_prompt = serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_string());

    let started = Instant::now();
    let reply = caller
        .invoke(ctx.model, &system_prompts, &human_prompt)
        .await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let output = extract_output(&reply.text);
    let observation = truncate_chars(&output.to_string(), OBSERVATION_MAX_CHARS);

    let tokens_in = reply.tokens_in.unwrap_or(0);
    let tokens_out = reply.tokens_out.unwrap_or(0);
    let cost_usd = estimate_cost_usd(ctx.provider, ctx.model, tokens_in, tokens_out);

    Ok(StepOutcome {
        input,
        output,
        observation,
        tokens_in,
        tokens_out,
        duration_ms,
        cost_usd,
    })
}

fn output_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{\s*"output"\s*:"#).expect("output regex is valid"))
}

/// Extract the agent's output object from model text.
///
/// 1. brace-balanced scan anchored at a `{"output": ...}` pattern
/// 2. generic JSON recovery over the whole text, taking its `output` field
/// 3. wrap the full raw text - the agent's text is never discarded
pub fn extract_output(text: &str) -> Value {
    if let Some(m) = output_key_re().find(text) {
        if let Some(end) = balanced_end(text.as_bytes(), m.start()) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[m.start()..=end]) {
                if let Some(output) = value.get("output") {
                    return output.clone();
                }
            }
        }
    }

    if let Some(value) = extract_json_object(text) {
        if let Some(output) = value.get("output") {
            return output.clone();
        }
    }

    json!({ "raw": text })
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
