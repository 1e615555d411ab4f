//! Coordinator (spec §4.6): capability-based dispatch, a resource lock
//! table with user-arbitrated conflict resolution, result aggregation, and
//! status/conflict reporting. Grounded on the teacher's
//! `agents/orchestrator/mod.rs` wiring plus the accounting style of
//! `result_store.rs`/`status_manager.rs`, reworked onto the synchronous
//! registry rather than an async task-result map.

mod conflict;
mod result;

pub use conflict::{Conflict, ConflictKind, Resolution};
pub use result::AggregatedResult;

use crate::agent::{AgentRegistry, AgentState, AgentType};
use crate::concurrency::{sleep, Mutex};
use crate::config::{CoordinatorConfig, DefaultResolution};
use crate::constants;
use crate::error::{ForgeError, Result};
use crate::queue::Task;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// `(conflict, message, options) -> selected index`. Out-of-range values
/// are treated as an error resolution (spec §6).
pub type PromptCallback = Box<dyn Fn(&Conflict, &str, &[&str]) -> i32 + Send + Sync>;

struct LockEntry {
    resource_id: String,
    agent_id: Uuid,
    agent_name: String,
    action: String,
}

struct State {
    locks: Vec<LockEntry>,
    conflicts: Vec<Conflict>,
}

/// Dispatches tasks to agents, arbitrates resource contention, aggregates
/// results. The coordinator lock is a leaf in the lock order (spec §5): no
/// other lock is acquired while holding it.
pub struct Coordinator {
    state: Mutex<State>,
    config: CoordinatorConfig,
    prompt: Option<PromptCallback>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, prompt: Option<PromptCallback>) -> Self {
        Self {
            state: Mutex::new(State {
                locks: Vec::new(),
                conflicts: Vec::new(),
            }),
            config,
            prompt,
        }
    }

    /// Score each IDLE, capability-qualified agent and attach the task to
    /// the winner. Ties break on registry order (spec §4.6).
    pub fn assign_task(&self, registry: &AgentRegistry, task: &Task) -> Option<Uuid> {
        let candidates = registry.list();
        let mut best: Option<(i64, Uuid)> = None;

        for agent in &candidates {
            if agent.state != AgentState::Idle {
                continue;
            }
            // `AgentSnapshot` drops the capability mask, so the
            // subset check is re-derived via `get_by_capability`. This
            // gate precedes preferred-agent selection and scoring alike
            // (spec §4.6): an unqualified agent is never assigned.
            let qualifies = registry
                .get_by_capability(task.required_capabilities)
                .iter()
                .any(|a| a.id == agent.id);
            if !qualifies {
                continue;
            }
            if let Some(preferred) = &task.preferred_agent {
                if preferred == &agent.name {
                    return Some(agent.id);
                }
            }

            let type_score = type_score(task.task_type, agent.agent_type);
            let score = type_score - agent.tasks_completed as i64;
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, agent.id));
            }
        }

        best.map(|(_, id)| id)
    }

    /// Override variant: assign directly to a named agent.
    pub fn assign_to(&self, registry: &AgentRegistry, name: &str) -> Option<Uuid> {
        registry.get(name).map(|a| a.id)
    }

    /// Create `n` autonomous child agents under `parent_task`'s nominal
    /// parent, named `worker_{task_id}_{i}`, and start each (spec §4.6).
    /// Partial failure is logged, not propagated.
    pub fn spawn_workers(&self, registry: &AgentRegistry, parent: Uuid, parent_task: &Task, n: usize) -> bool {
        let mut all_ok = true;
        for i in 0..n {
            let name = format!("worker_{}_{}", parent_task.id, i);
            let mut cfg = crate::agent::AgentConfig::default();
            cfg.focus = parent_task.description.clone();
            match registry.spawn_child(parent, name.clone(), AgentType::Autonomous, cfg) {
                Ok(child) => {
                    if let Err(e) = registry.start(child) {
                        warn!("spawned worker {name} failed to start: {e}");
                        all_ok = false;
                    }
                }
                Err(e) => {
                    warn!("failed to spawn worker {name}: {e}");
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    /// Poll every `COORDINATOR_WAIT_POLL_INTERVAL_MS` until no agent is
    /// RUNNING or `ms` elapses. `ms == 0` waits indefinitely.
    pub fn wait_all(&self, registry: &AgentRegistry, ms: u64) -> bool {
        let deadline = if ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(ms)) };
        loop {
            let any_running = !registry.get_by_state(AgentState::Running).is_empty();
            if !any_running {
                return true;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return false;
                }
            }
            sleep(Duration::from_millis(constants::COORDINATOR_WAIT_POLL_INTERVAL_MS));
        }
    }

    /// Request `resource` for `agent` performing `action`. Grants it if
    /// unlocked or already held by `agent`; otherwise logs a conflict and
    /// refuses.
    pub fn request_resource(&self, agent_id: Uuid, agent_name: &str, resource: &str, action: &str) -> bool {
        let mut state = self.state.lock();
        if let Some(entry) = state.locks.iter().find(|e| e.resource_id == resource) {
            if entry.agent_id == agent_id {
                return true;
            }
            let holder = entry.agent_id;
            let holder_name = entry.agent_name.clone();
            let holder_action = entry.action.clone();
            state.conflicts.push(Conflict::new_resource(
                holder,
                holder_name,
                holder_action,
                agent_id,
                agent_name.to_string(),
                resource.to_string(),
                action.to_string(),
            ));
            return false;
        }
        state.locks.push(LockEntry {
            resource_id: resource.to_string(),
            agent_id,
            agent_name: agent_name.to_string(),
            action: action.to_string(),
        });
        true
    }

    /// Release `resource`; only its current holder may do so.
    pub fn release_resource(&self, agent_id: Uuid, resource: &str) -> bool {
        let mut state = self.state.lock();
        if let Some(idx) = state
            .locks
            .iter()
            .position(|e| e.resource_id == resource && e.agent_id == agent_id)
        {
            let last = state.locks.len() - 1;
            state.locks.swap(idx, last);
            state.locks.pop();
            true
        } else {
            false
        }
    }

    /// The first still-unresolved conflict in the log, if any.
    pub fn detect_conflict(&self) -> Option<Conflict> {
        let state = self.state.lock();
        state.conflicts.iter().find(|c| c.resolved_at.is_none()).cloned()
    }

    /// Arbitrate a logged conflict via the configured prompt callback (spec
    /// §4.6). With no callback, defaults to `AGENT1` and logs a warning —
    /// `CoordinatorConfig::default_resolution` is stored but, per spec §9,
    /// never consulted here.
    pub fn resolve_conflict(&self, conflict_id: Uuid) -> Result<Resolution> {
        let mut state = self.state.lock();
        let idx = state
            .conflicts
            .iter()
            .position(|c| c.id == conflict_id)
            .ok_or_else(|| ForgeError::InvalidArgument(format!("no such conflict {conflict_id}")))?;

        let message = format!(
            "{} wants to {} but {} holds {} (action: {})",
            state.conflicts[idx].agent2_name,
            state.conflicts[idx].agent2_action,
            state.conflicts[idx].agent1_name,
            state.conflicts[idx].resource_id,
            state.conflicts[idx].agent1_action,
        );
        let options = ["agent1", "agent2", "both", "cancel-both"];

        let resolution = match &self.prompt {
            Some(cb) => {
                let choice = cb(&state.conflicts[idx], &message, &options);
                match choice {
                    0 => Resolution::Agent1,
                    1 => Resolution::Agent2,
                    2 => Resolution::Both,
                    3 => Resolution::Neither,
                    _ => Resolution::Error,
                }
            }
            None => {
                warn!(
                    "resolving conflict over {} with no prompt callback configured; defaulting to AGENT1",
                    state.conflicts[idx].resource_id
                );
                Resolution::Agent1
            }
        };

        let agent1 = state.conflicts[idx].agent1_id;
        let agent2 = state.conflicts[idx].agent2_id;
        let agent2_name = state.conflicts[idx].agent2_name.clone();
        let agent2_action = state.conflicts[idx].agent2_action.clone();
        let resource = state.conflicts[idx].resource_id.clone();

        if matches!(resolution, Resolution::Agent2 | Resolution::Neither) {
            if let Some(pos) = state
                .locks
                .iter()
                .position(|e| e.resource_id == resource && e.agent_id == agent1)
            {
                state.locks.remove(pos);
            }
        }
        if matches!(resolution, Resolution::Agent2) {
            state.locks.push(LockEntry {
                resource_id: resource,
                agent_id: agent2,
                agent_name: agent2_name,
                action: agent2_action,
            });
        }

        state.conflicts[idx].resolved_at = Some(chrono::Utc::now());
        state.conflicts[idx].resolution = Some(resolution);
        info!("conflict {conflict_id} resolved as {resolution:?}");
        Ok(resolution)
    }

    /// Combine each agent's terminal outcome into an [`AggregatedResult`]
    /// (spec §4.6).
    pub fn aggregate_results(&self, registry: &AgentRegistry, agent_ids: &[Uuid]) -> AggregatedResult {
        result::aggregate(registry, agent_ids)
    }

    pub fn status_report(&self, registry: &AgentRegistry) -> String {
        let unresolved = self.state.lock().conflicts.iter().filter(|c| c.resolved_at.is_none()).count();
        let mut out = String::from("name\ttype\tstate\ttasks_completed\n");
        for agent in registry.list() {
            out.push_str(&format!(
                "{}\t{:?}\t{:?}\t{}\n",
                agent.name, agent.agent_type, agent.state, agent.tasks_completed
            ));
        }
        out.push_str(&format!("unresolved conflicts: {unresolved}\n"));
        out
    }

    pub fn conflict_report(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        for c in state.conflicts.iter() {
            out.push_str(&format!(
                "[{}] {} vs {} over {} -> {:?}\n",
                c.id, c.agent1_name, c.agent2_name, c.resource_id, c.resolution
            ));
        }
        out
    }
}

fn type_score(task_type: crate::queue::TaskType, agent_type: AgentType) -> i64 {
    use crate::queue::TaskType::*;
    use AgentType::*;
    match (task_type, agent_type) {
        (Build, Build) => 100,
        (Fix, Smart) | (Analyze, Smart) => 100,
        (Fix, Build) | (Analyze, Build) => 50,
        (Execute, Autonomous) | (Modify, Autonomous) => 100,
        _ => 50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::capabilities::Capabilities;
    use crate::config::RegistryConfig;
    use crate::queue::{Priority, TaskType};

    fn registry() -> AgentRegistry {
        AgentRegistry::new(
            RegistryConfig { max_concurrent: 8 },
            crate::agent::Executors::mock(),
            None,
            None,
        )
    }

    #[test]
    fn assign_task_prefers_exact_type_match_and_no_idle_agent_yields_none() {
        let reg = registry();
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            None,
        );
        let task = Task::new("t1", "build it", TaskType::Build, Priority::Normal);
        assert!(coord.assign_task(&reg, &task).is_none());

        let build_agent = reg.create_agent("builder", AgentType::Build, AgentConfig::default()).unwrap();
        reg.start(build_agent).unwrap();
        let winner = coord.assign_task(&reg, &task).unwrap();
        assert_eq!(winner, build_agent);
    }

    #[test]
    fn resource_conflict_scenario() {
        // spec §8 scenario 3
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            Some(Box::new(|_c, _msg, _opts| 1)),
        );
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(coord.request_resource(a, "agent-a", "file.x", "write"));
        assert!(!coord.request_resource(b, "agent-b", "file.x", "read"));

        let conflict = coord.detect_conflict().unwrap();
        let resolution = coord.resolve_conflict(conflict.id).unwrap();
        assert_eq!(resolution, Resolution::Agent2);

        assert!(!coord.request_resource(a, "agent-a", "file.x", "write"));
        assert!(coord.request_resource(b, "agent-b", "file.x", "read"));
    }

    #[test]
    fn conflict_resolution_with_no_callback_defaults_to_agent1() {
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            None,
        );
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        coord.request_resource(a, "a", "res", "write");
        coord.request_resource(b, "b", "res", "read");
        let conflict = coord.detect_conflict().unwrap();
        let resolution = coord.resolve_conflict(conflict.id).unwrap();
        assert_eq!(resolution, Resolution::Agent1);
        // agent1 still holds the resource
        assert!(coord.request_resource(a, "a", "res", "write"));
    }

    #[test]
    fn spawn_workers_creates_named_autonomous_children() {
        let reg = registry();
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            None,
        );
        let parent = reg.create_agent("coord1", AgentType::Coordinator, AgentConfig::default()).unwrap();
        let task = Task::new("t1", "do work", TaskType::General, Priority::Normal);
        assert!(coord.spawn_workers(&reg, parent, &task, 3));
        assert_eq!(reg.get_by_type(AgentType::Autonomous).len(), 3);
    }

    #[test]
    fn capability_gate_excludes_unqualified_agents() {
        let reg = registry();
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            None,
        );
        let agent = reg.create_agent("a1", AgentType::Autonomous, AgentConfig::default()).unwrap();
        reg.start(agent).unwrap();
        let task = Task::new("t1", "needs build", TaskType::Build, Priority::Normal)
            .with_required_capabilities(Capabilities::BUILD);
        assert!(coord.assign_task(&reg, &task).is_none());
    }

    #[test]
    fn capability_gate_excludes_an_unqualified_preferred_agent() {
        let reg = registry();
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            None,
        );
        let preferred = reg.create_agent("picky", AgentType::Autonomous, AgentConfig::default()).unwrap();
        reg.start(preferred).unwrap();
        let task = Task::new("t1", "needs build", TaskType::Build, Priority::Normal)
            .with_required_capabilities(Capabilities::BUILD)
            .with_preferred_agent("picky");
        assert!(coord.assign_task(&reg, &task).is_none());
    }

    #[test]
    fn conflict_message_reports_both_agents_actions() {
        let captured = std::sync::Arc::new(Mutex::new(String::new()));
        let captured2 = captured.clone();
        let coord = Coordinator::new(
            CoordinatorConfig { default_resolution: DefaultResolution::Agent1 },
            Some(Box::new(move |_c, msg, _opts| {
                *captured2.lock() = msg.to_string();
                1
            })),
        );
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        coord.request_resource(a, "writer", "file.x", "write");
        coord.request_resource(b, "reader", "file.x", "read");
        let conflict = coord.detect_conflict().unwrap();
        coord.resolve_conflict(conflict.id).unwrap();

        let message = captured.lock().clone();
        assert!(message.contains("write"));
        assert!(message.contains("read"));
        assert!(message.contains("writer"));
        assert!(message.contains("reader"));
    }
}
