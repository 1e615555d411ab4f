use crate::capabilities::Capabilities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Agent classification tag (spec §3); drives the default capability mask
/// and the coordinator's type-based scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    Smart,
    Autonomous,
    Build,
    Coordinator,
    Custom,
}

/// Agent lifecycle state (spec §3). `CREATED -> INITIALIZING -> IDLE <->
/// RUNNING` (also `PAUSED` via `RUNNING -> PAUSED -> RUNNING`), terminal
/// `COMPLETED` / `TERMINATED` / `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Created,
    Initializing,
    Idle,
    Running,
    Paused,
    Completed,
    Terminated,
    Error,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::Completed | AgentState::Terminated | AgentState::Error)
    }

    /// Is `to` a legal transition from `self` (spec §3 invariants)?
    pub fn can_transition_to(self, to: AgentState) -> bool {
        use AgentState::*;
        match to {
            Initializing => self == Created,
            Idle => matches!(self, Initializing | Running | Created),
            Running => matches!(self, Created | Idle | Paused),
            Paused => self == Running,
            Completed | Terminated | Error => !self.is_terminal(),
            Created => false,
        }
    }
}

/// Per-agent configuration (spec §3: "timeouts, verbosity, model
/// parameters, mock flag, focus text").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub timeout_sec: u64,
    pub verbosity: u8,
    pub mock_mode: bool,
    pub focus: String,
    pub auto_start: bool,
    pub model_params: HashMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout_sec: crate::constants::DEFAULT_TASK_TIMEOUT_SECS,
            verbosity: 1,
            mock_mode: false,
            focus: String::new(),
            auto_start: false,
            model_params: HashMap::new(),
        }
    }
}

/// A named, long-lived worker (spec §3). Owned exclusively by
/// [`super::registry::AgentRegistry`]; mutated only under its own lock or
/// the registry's lock.
#[derive(Debug)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub agent_type: AgentType,
    pub capabilities: Capabilities,
    pub state: AgentState,
    pub config: AgentConfig,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub runtime_sec: f64,
    pub current_task: Option<String>,
    pub last_result: Option<String>,
    pub last_error: Option<String>,
    pub thread_active: bool,
    /// Non-owning handle (spec §9: arena-style index, never `Rc`/`Weak`).
    pub parent: Option<Uuid>,
    /// Non-owning handles to children; the registry owns the children.
    pub children: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, agent_type: AgentType, config: AgentConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            capabilities: Capabilities::defaults_for(agent_type),
            agent_type,
            state: AgentState::Created,
            config,
            tasks_completed: 0,
            tasks_failed: 0,
            runtime_sec: 0.0,
            current_task: None,
            last_result: None,
            last_error: None,
            thread_active: false,
            parent: None,
            children: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            name: self.name.clone(),
            agent_type: self.agent_type,
            state: self.state,
            tasks_completed: self.tasks_completed,
            tasks_failed: self.tasks_failed,
            runtime_sec: self.runtime_sec,
            current_task: self.current_task.clone(),
            last_result: self.last_result.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Cloneable read-only view of an [`Agent`], returned by registry lookups
/// that hand data across the registry lock boundary (spec §4.5
/// `get_by_type`/`get_by_state`/`get_by_capability` return "newly allocated
/// arrays... that the caller frees").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: Uuid,
    pub name: String,
    pub agent_type: AgentType,
    pub state: AgentState,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub runtime_sec: f64,
    pub current_task: Option<String>,
    pub last_result: Option<String>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_legal_only_from_created_or_idle() {
        assert!(AgentState::Created.can_transition_to(AgentState::Running));
        assert!(AgentState::Idle.can_transition_to(AgentState::Running));
        assert!(!AgentState::Completed.can_transition_to(AgentState::Running));
    }

    #[test]
    fn pause_only_from_running_resume_only_from_paused() {
        assert!(AgentState::Running.can_transition_to(AgentState::Paused));
        assert!(!AgentState::Idle.can_transition_to(AgentState::Paused));
        assert!(AgentState::Paused.can_transition_to(AgentState::Running));
    }

    #[test]
    fn terminate_legal_from_any_nonterminal_state() {
        for s in [
            AgentState::Created,
            AgentState::Initializing,
            AgentState::Idle,
            AgentState::Running,
            AgentState::Paused,
        ] {
            assert!(s.can_transition_to(AgentState::Terminated));
        }
        assert!(!AgentState::Terminated.can_transition_to(AgentState::Terminated));
    }
}
