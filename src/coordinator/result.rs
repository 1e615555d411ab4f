use crate::agent::{AgentRegistry, AgentState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Combined outcome across a set of terminal agents (spec §3/§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub all_succeeded: bool,
    pub success_count: usize,
    pub failure_count: usize,
    pub timeout_count: usize,
    pub outputs: Vec<(String, String)>,
    pub combined: String,
    pub first_error: Option<String>,
    pub total_duration_sec: f64,
}

/// Inspect each agent's terminal state and fold it into an
/// [`AggregatedResult`]: `COMPLETED` contributes `last_result`;
/// `ERROR`/`TERMINATED` bumps `failure_count` and (first one only) sets
/// `first_error`; any other state bumps `timeout_count`. Duration is the
/// arithmetic sum of agent runtimes, not wall clock (spec §4.6).
pub fn aggregate(registry: &AgentRegistry, agent_ids: &[Uuid]) -> AggregatedResult {
    let mut success_count = 0;
    let mut failure_count = 0;
    let mut timeout_count = 0;
    let mut outputs = Vec::new();
    let mut first_error = None;
    let mut total_duration_sec = 0.0;
    let mut blob = String::new();

    for id in agent_ids {
        let Some(agent) = registry.get(&id.to_string()) else {
            continue;
        };
        total_duration_sec += agent.runtime_sec;
        match agent.state {
            AgentState::Completed => {
                success_count += 1;
                let output = agent.last_result.clone().unwrap_or_default();
                outputs.push((agent.name.clone(), output));
            }
            AgentState::Error | AgentState::Terminated => {
                failure_count += 1;
                if first_error.is_none() {
                    first_error = agent.last_error.clone().or_else(|| Some(agent.name.clone()));
                }
            }
            _ => timeout_count += 1,
        }
    }

    for (name, output) in &outputs {
        blob.push_str(&format!("[{name}]:\n{output}\n---\n"));
    }

    AggregatedResult {
        all_succeeded: failure_count == 0 && timeout_count == 0,
        success_count,
        failure_count,
        timeout_count,
        outputs,
        combined: blob,
        first_error,
        total_duration_sec,
    }
}
