//! Dependency-aware ordering of agent definitions.
//!
//! This is deliberately not a strict topological sort. Each agent is visited
//! once, depth-first, in declaration order, and marked visited *before* its
//! dependencies are walked. Consequences, kept for output compatibility with
//! the shipped product:
//!
//! - every dependency id appears before its dependents (absent cycles)
//! - agents with no dependencies keep their relative declaration order
//! - unknown dependency ids are silently ignored
//! - a cycle is not an error: the first-visited member of the cycle is
//!   emitted without waiting for the rest, and its not-yet-visited
//!   dependents are not blocked

use std::collections::{HashMap, HashSet};

use super::types::AgentDefinition;

/// Return indices into `agents` in execution order.
pub fn schedule(agents: &[AgentDefinition]) -> Vec<usize> {
    let by_id: HashMap<&str, usize> = agents
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id.as_str(), i))
        .collect();

    let mut visited: HashSet<usize> = HashSet::with_capacity(agents.len());
    let mut order: Vec<usize> = Vec::with_capacity(agents.len());

    for i in 0..agents.len() {
        visit(i, agents, &by_id, &mut visited, &mut order);
    }
    order
}

fn visit(
    index: usize,
    agents: &[AgentDefinition],
    by_id: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    // Mark before recursing so a cycle terminates instead of looping.
    if !visited.insert(index) {
        return;
    }
    for dep in &agents[index].dependencies {
        if let Some(&dep_index) = by_id.get(dep.as_str()) {
            visit(dep_index, agents, by_id, visited, order);
        }
        // Unknown ids are ignored, not an error.
    }
    order.push(index);
}
