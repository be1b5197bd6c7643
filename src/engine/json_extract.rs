//! Best-effort recovery of a JSON object from free-form model output.
//!
//! Models are asked for JSON but frequently wrap it in prose or markdown
//! fences. Recovery runs an ordered chain of parser strategies, each
//! returning `Option`, tried in sequence:
//!
//! 1. fenced code block (```json ... ``` or bare ``` ... ```)
//! 2. balanced-brace scan from the first `{`
//! 3. raw parse of the whole trimmed text

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Try to recover a JSON object from the given text. Returns `None` only
/// when no strategy yields a JSON object (arrays and scalars don't count).
pub fn extract_json_object(text: &str) -> Option<Value> {
    const STRATEGIES: &[fn(&str) -> Option<Value>] =
        &[from_fenced_block, from_balanced_braces, from_raw];
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(text).filter(Value::is_object))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence regex is valid"))
}

/// Strategy 1: contents of the first markdown code fence.
fn from_fenced_block(text: &str) -> Option<Value> {
    let captures = fence_re().captures(text)?;
    serde_json::from_str(captures.get(1)?.as_str().trim()).ok()
}

/// Strategy 2: first balanced `{...}` span that parses.
///
/// Scans from each `{` in turn, tracking brace depth while respecting string
/// literals and escapes, and tries to parse every balanced candidate.
fn from_balanced_braces(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(open) = text[start..].find('{').map(|i| start + i) {
        if let Some(end) = balanced_end(bytes, open) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[open..=end]) {
                return Some(value);
            }
        }
        start = open + 1;
    }
    None
}

/// Strategy 3: the whole text is already JSON.
fn from_raw(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Byte index of the `}` closing the brace at `open`, honoring strings.
pub(crate) fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes.get(open), Some(&b'{'));
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
