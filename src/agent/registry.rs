//! Agent registry (spec §4.5): the sole owner of every agent and its mutex
//! discipline. Grounded on the teacher's `agents/orchestrator/agent_registry.rs`
//! (`AgentRegistry`/`AgentFactory` shape), reworked from an async
//! type-keyed map into a synchronous, name-and-id-indexed array with
//! per-agent locks, since this registry holds many instances of the same
//! agent type rather than one singleton per type.

use super::executor::Executors;
use super::types::{Agent, AgentConfig, AgentSnapshot, AgentState, AgentType};
use crate::capabilities::Capabilities;
use crate::concurrency::pool::WorkerPool;
use crate::concurrency::{sleep, Mutex};
use crate::config::RegistryConfig;
use crate::constants;
use crate::error::{ForgeError, Result};
use crate::kv_store::KvStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Shared by `run_sync` (via `AgentRegistry::dispatch`) and `run_async`'s
/// worker-pool job, so both paths invoke the same real executors (spec
/// §4.5).
fn dispatch_with(executors: &Executors, agent_type: AgentType, mock: bool, description: &str) -> (bool, String) {
    if mock {
        return (true, format!("[mock result for: {description}]"));
    }
    match agent_type {
        AgentType::Smart => match executors.smart.execute(description) {
            Ok(r) => (r.error.is_none(), r.error.unwrap_or(r.output)),
            Err(e) => (false, e),
        },
        AgentType::Autonomous => match executors.autonomous.execute(description) {
            Ok(out) => (true, out),
            Err(e) => (false, e),
        },
        AgentType::Build => {
            warn!("build executor is not invoked through run_sync/run_async");
            (false, "build executor unsupported via run_sync/run_async".into())
        }
        AgentType::Coordinator | AgentType::Custom => {
            warn!("agent type {agent_type:?} has no executor for run_sync/run_async");
            (false, format!("no executor available for agent type {agent_type:?}"))
        }
    }
}

struct RegistryState {
    agents: Vec<Arc<Mutex<Agent>>>,
    by_id: HashMap<Uuid, usize>,
    by_name: HashMap<String, usize>,
}

pub struct AgentRegistry {
    state: Mutex<RegistryState>,
    executors: Arc<Executors>,
    kv: Option<Arc<KvStore>>,
    pool: Option<Arc<WorkerPool>>,
    config: RegistryConfig,
}

impl AgentRegistry {
    pub fn new(
        config: RegistryConfig,
        executors: Executors,
        kv: Option<Arc<KvStore>>,
        pool: Option<Arc<WorkerPool>>,
    ) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                agents: Vec::new(),
                by_id: HashMap::new(),
                by_name: HashMap::new(),
            }),
            executors: Arc::new(executors),
            kv,
            pool,
            config,
        }
    }

    fn find(&self, id: Uuid) -> Result<Arc<Mutex<Agent>>> {
        let state = self.state.lock();
        state
            .by_id
            .get(&id)
            .map(|&idx| state.agents[idx].clone())
            .ok_or_else(|| ForgeError::InvalidArgument(format!("no such agent {id}")))
    }

    fn resolve(&self, name_or_id: &str) -> Result<Arc<Mutex<Agent>>> {
        if let Ok(id) = Uuid::parse_str(name_or_id) {
            if let Ok(arc) = self.find(id) {
                return Ok(arc);
            }
        }
        let state = self.state.lock();
        state
            .by_name
            .get(name_or_id)
            .map(|&idx| state.agents[idx].clone())
            .ok_or_else(|| ForgeError::InvalidArgument(format!("no such agent {name_or_id}")))
    }

    /// Create an agent. Rejects a duplicate name outright; warns (but still
    /// creates) when the running-agent count already meets `max_concurrent`
    /// (spec §4.5).
    pub fn create_agent(
        &self,
        name: impl Into<String>,
        agent_type: AgentType,
        config: AgentConfig,
    ) -> Result<Uuid> {
        let name = name.into();
        if name.is_empty() {
            return Err(ForgeError::InvalidArgument("agent name must not be empty".into()));
        }

        let mut state = self.state.lock();
        if state.by_name.contains_key(&name) {
            return Err(ForgeError::InvalidArgument(format!("duplicate agent name {name}")));
        }

        let running = state
            .agents
            .iter()
            .filter(|a| a.lock().state == AgentState::Running)
            .count();
        if running >= self.config.max_concurrent {
            warn!(
                "creating agent {name} while {running} agents are already running (max_concurrent={})",
                self.config.max_concurrent
            );
        }

        let auto_start = config.auto_start;
        let mut agent = Agent::new(&name, agent_type, config);
        agent.state = AgentState::Initializing;
        agent.state = AgentState::Idle;
        let id = agent.id;

        let idx = state.agents.len();
        state.agents.push(Arc::new(Mutex::new(agent)));
        state.by_id.insert(id, idx);
        state.by_name.insert(name.clone(), idx);
        drop(state);

        info!("created agent {name} ({id}) as {agent_type:?}");
        if auto_start {
            self.start(id)?;
        }
        Ok(id)
    }

    pub fn get(&self, name_or_id: &str) -> Option<AgentSnapshot> {
        self.resolve(name_or_id).ok().map(|a| a.lock().snapshot())
    }

    pub fn list(&self) -> Vec<AgentSnapshot> {
        let state = self.state.lock();
        state.agents.iter().map(|a| a.lock().snapshot()).collect()
    }

    pub fn get_by_type(&self, agent_type: AgentType) -> Vec<AgentSnapshot> {
        self.list().into_iter().filter(|a| a.agent_type == agent_type).collect()
    }

    pub fn get_by_state(&self, state: AgentState) -> Vec<AgentSnapshot> {
        self.list().into_iter().filter(|a| a.state == state).collect()
    }

    pub fn get_by_capability(&self, mask: Capabilities) -> Vec<AgentSnapshot> {
        let state = self.state.lock();
        state
            .agents
            .iter()
            .filter(|a| a.lock().capabilities.contains(mask))
            .map(|a| a.lock().snapshot())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.state.lock().agents.len()
    }

    fn transition(&self, id: Uuid, to: AgentState) -> Result<()> {
        let arc = self.find(id)?;
        let mut agent = arc.lock();
        if !agent.state.can_transition_to(to) {
            return Err(ForgeError::StateViolation(format!(
                "agent {} cannot transition {:?} -> {:?}",
                agent.name, agent.state, to
            )));
        }
        agent.state = to;
        info!("agent {} -> {:?}", agent.name, to);
        Ok(())
    }

    pub fn start(&self, id: Uuid) -> Result<()> {
        self.transition(id, AgentState::Running)?;
        let arc = self.find(id)?;
        arc.lock().state = AgentState::Idle;
        Ok(())
    }

    pub fn pause(&self, id: Uuid) -> Result<()> {
        self.transition(id, AgentState::Paused)
    }

    pub fn resume(&self, id: Uuid) -> Result<()> {
        self.transition(id, AgentState::Running)
    }

    /// Terminates all children first, then the agent itself. Waits
    /// `TERMINATE_GRACE_MS` for a cooperative worker thread to notice.
    pub fn terminate(&self, id: Uuid) -> Result<()> {
        let arc = self.find(id)?;
        let children = arc.lock().children.clone();
        for child in children {
            if let Ok(child_arc) = self.find(child) {
                let terminal = child_arc.lock().state.is_terminal();
                if !terminal {
                    self.terminate(child)?;
                }
            }
        }

        let thread_active = {
            let agent = arc.lock();
            if !agent.state.can_transition_to(AgentState::Terminated) {
                return Err(ForgeError::StateViolation(format!(
                    "agent {} cannot terminate from state {:?}",
                    agent.name, agent.state
                )));
            }
            agent.thread_active
        };
        if thread_active {
            sleep(Duration::from_millis(constants::TERMINATE_GRACE_MS));
        }
        let mut agent = arc.lock();
        agent.state = AgentState::Terminated;
        agent.completed_at = Some(Utc::now());
        info!("agent {} terminated", agent.name);
        Ok(())
    }

    /// Remove the agent from the registry (terminating it first if it was
    /// running/paused), then compact the backing array by moving the last
    /// entry into the removed slot (spec §4.5).
    pub fn remove(&self, id: Uuid) -> Result<()> {
        let current = self.find(id)?.lock().state;
        if matches!(current, AgentState::Running | AgentState::Paused) {
            self.terminate(id)?;
        }

        let mut state = self.state.lock();
        let idx = *state
            .by_id
            .get(&id)
            .ok_or_else(|| ForgeError::InvalidArgument(format!("no such agent {id}")))?;
        let name = state.agents[idx].lock().name.clone();

        let last = state.agents.len() - 1;
        state.agents.swap(idx, last);
        state.agents.pop();
        state.by_id.remove(&id);
        state.by_name.remove(&name);

        if idx != last {
            let (moved_id, moved_name) = {
                let moved = state.agents[idx].lock();
                (moved.id, moved.name.clone())
            };
            state.by_id.insert(moved_id, idx);
            state.by_name.insert(moved_name, idx);
        }
        Ok(())
    }

    /// Poll at `WAIT_POLL_INTERVAL_MS` for the agent to reach a terminal
    /// state. `ms == 0` polls indefinitely. Returns `true` immediately if
    /// the agent is already IDLE with no active worker thread.
    pub fn wait(&self, id: Uuid, ms: u64) -> bool {
        let Ok(arc) = self.find(id) else { return false };
        {
            let agent = arc.lock();
            if agent.state == AgentState::Idle && !agent.thread_active {
                return true;
            }
        }
        let deadline = if ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(ms)) };
        loop {
            {
                let agent = arc.lock();
                if agent.state.is_terminal() {
                    return true;
                }
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return false;
                }
            }
            sleep(Duration::from_millis(constants::WAIT_POLL_INTERVAL_MS));
        }
    }

    fn dispatch(&self, agent_type: AgentType, mock: bool, description: &str) -> (bool, String) {
        dispatch_with(&self.executors, agent_type, mock, description)
    }

    /// Synchronous execution (spec §4.5). Must be called with the agent
    /// IDLE.
    pub fn run_sync(&self, id: Uuid, description: &str) -> Result<String> {
        let arc = self.find(id)?;
        let (agent_type, mock) = {
            let mut agent = arc.lock();
            if agent.state != AgentState::Idle {
                return Err(ForgeError::StateViolation(format!(
                    "agent {} is not IDLE (state {:?})",
                    agent.name, agent.state
                )));
            }
            agent.state = AgentState::Running;
            agent.current_task = Some(description.to_string());
            (agent.agent_type, agent.config.mock_mode)
        };

        let started = Instant::now();
        let (ok, output) = self.dispatch(agent_type, mock, description);
        let elapsed = started.elapsed().as_secs_f64();

        let mut agent = arc.lock();
        agent.runtime_sec += elapsed;
        agent.current_task = None;
        agent.state = AgentState::Idle;
        if ok {
            agent.tasks_completed += 1;
            agent.last_result = Some(output.clone());
        } else {
            agent.tasks_failed += 1;
            agent.last_error = Some(output.clone());
        }
        drop(agent);

        if ok {
            Ok(output)
        } else {
            Err(ForgeError::ExecutorFailure(output))
        }
    }

    /// Asynchronous execution (spec §4.5). Falls back to `run_sync` if no
    /// worker pool is configured.
    pub fn run_async(&self, id: Uuid, description: &str) -> Result<bool> {
        let Some(pool) = self.pool.clone() else {
            return self.run_sync(id, description).map(|_| true);
        };

        let arc = self.find(id)?;
        let (name, agent_type, mock) = {
            let mut agent = arc.lock();
            if agent.state != AgentState::Idle {
                return Err(ForgeError::StateViolation(format!(
                    "agent {} is not IDLE (state {:?})",
                    agent.name, agent.state
                )));
            }
            if agent.thread_active {
                return Err(ForgeError::StateViolation(format!(
                    "agent {} already has an active worker thread",
                    agent.name
                )));
            }
            agent.state = AgentState::Running;
            agent.thread_active = true;
            agent.current_task = Some(description.to_string());
            (agent.name.clone(), agent.agent_type, agent.config.mock_mode)
        };

        let kv = self.kv.clone();
        let description = description.to_string();
        if let Some(kv) = &kv {
            let _ = kv.set(&format!("{name}.status"), "running");
            let _ = kv.set(&format!("{name}.task"), &description);
        }

        // Dispatch is self-contained (no registry reference captured): the
        // closure only needs the cloned Arc<Mutex<Agent>> plus the cloned
        // Arc<Executors> plus owned copies of the inputs dispatch needs,
        // matching the worker pool's `'static` job bound.
        let executors = self.executors.clone();
        let arc_for_job = arc.clone();
        pool.submit(move || {
            let started = Instant::now();
            let (ok, output) = dispatch_with(&executors, agent_type, mock, &description);
            let elapsed = started.elapsed().as_secs_f64();

            let mut agent = arc_for_job.lock();
            agent.runtime_sec += elapsed;
            agent.current_task = None;
            agent.thread_active = false;
            agent.state = AgentState::Idle;
            if ok {
                agent.tasks_completed += 1;
                agent.last_result = Some(output.clone());
            } else {
                agent.tasks_failed += 1;
                agent.last_error = Some(output.clone());
            }
            drop(agent);

            if let Some(kv) = &kv {
                let status = if ok { "completed" } else { "failed" };
                let _ = kv.set(&format!("{name}.status"), status);
                let _ = kv.set(&format!("{name}.result"), &output);
            }
        });

        Ok(true)
    }

    /// Spawn a child under `parent`. Requires `parent` to hold `SPAWN`.
    pub fn spawn_child(
        &self,
        parent: Uuid,
        name: impl Into<String>,
        agent_type: AgentType,
        config: AgentConfig,
    ) -> Result<Uuid> {
        let parent_arc = self.find(parent)?;
        if !parent_arc.lock().capabilities.contains(Capabilities::SPAWN) {
            return Err(ForgeError::StateViolation(
                "parent agent lacks the SPAWN capability".into(),
            ));
        }

        let child_id = self.create_agent(name, agent_type, config)?;
        let child_arc = self.find(child_id)?;
        child_arc.lock().parent = Some(parent);
        parent_arc.lock().children.push(child_id);
        Ok(child_id)
    }

    pub fn wait_children(&self, parent: Uuid, ms: u64) -> bool {
        let Ok(arc) = self.find(parent) else { return false };
        let children = arc.lock().children.clone();
        let deadline = if ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(ms)) };
        loop {
            let all_terminal = children.iter().all(|c| {
                self.find(*c).map(|a| a.lock().state.is_terminal()).unwrap_or(true)
            });
            if all_terminal {
                return true;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return false;
                }
            }
            sleep(Duration::from_millis(constants::WAIT_POLL_INTERVAL_MS));
        }
    }

    pub fn terminate_children(&self, parent: Uuid) -> Result<()> {
        let arc = self.find(parent)?;
        let children = arc.lock().children.clone();
        for child in children {
            if let Ok(child_arc) = self.find(child) {
                if !child_arc.lock().state.is_terminal() {
                    self.terminate(child)?;
                }
            }
        }
        Ok(())
    }
}
