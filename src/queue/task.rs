use crate::capabilities::Capabilities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority. Ordered `Low < Normal < High < Critical`; derives the
/// `Ord` the heap sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Build,
    Fix,
    Analyze,
    Install,
    Execute,
    Modify,
    Query,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Assigned,
    Running,
    WaitingChild,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled | TaskState::Timeout
        )
    }
}

/// Completion/error/progress callbacks a caller may attach to a task.
/// Stands in for the spec's function-pointer + opaque-user-data triple:
/// a capturing closure carries its own context.
#[derive(Default)]
pub struct TaskCallbacks {
    pub on_completion: Option<Box<dyn FnMut(&Task) + Send>>,
    pub on_error: Option<Box<dyn FnMut(&Task, &str) + Send>>,
    pub on_progress: Option<Box<dyn FnMut(&Task, u8, &str) + Send>>,
}

impl std::fmt::Debug for TaskCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCallbacks")
            .field("on_completion", &self.on_completion.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// A unit of work (spec §3). Owned by the caller at construction time,
/// by the [`super::TaskQueue`] while enqueued, and by the assigned agent
/// while running.
#[derive(Debug)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub state: TaskState,
    pub required_capabilities: Capabilities,
    pub preferred_agent: Option<String>,
    pub project_path: Option<String>,
    pub input: serde_json::Value,
    pub context: serde_json::Value,
    pub result: serde_json::Value,
    pub error: Option<String>,
    pub progress_pct: u8,
    pub progress_message: String,
    pub timeout_sec: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub dependencies: Vec<String>,
    pub dependencies_met: bool,
    pub callbacks: TaskCallbacks,
    /// Current position in the queue's heap array; `-1` when not enqueued.
    /// Invariant (spec §3): equals the task's current heap position
    /// whenever the task is in the heap.
    pub(crate) heap_index: i64,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>, task_type: TaskType, priority: Priority) -> Self {
        let dependencies = Vec::new();
        Self {
            id: id.into(),
            description: description.into(),
            task_type,
            priority,
            state: TaskState::Pending,
            required_capabilities: Capabilities::empty(),
            preferred_agent: None,
            project_path: None,
            input: serde_json::Value::Null,
            context: serde_json::Value::Null,
            result: serde_json::Value::Null,
            error: None,
            progress_pct: 0,
            progress_message: String::new(),
            timeout_sec: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            exit_code: None,
            dependencies,
            dependencies_met: true,
            callbacks: TaskCallbacks::default(),
            heap_index: -1,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies_met = dependencies.is_empty();
        self.dependencies = dependencies;
        self
    }

    pub fn with_required_capabilities(mut self, caps: Capabilities) -> Self {
        self.required_capabilities = caps;
        self
    }

    pub fn with_preferred_agent(mut self, name: impl Into<String>) -> Self {
        self.preferred_agent = Some(name.into());
        self
    }

    pub fn with_timeout_sec(mut self, secs: u64) -> Self {
        self.timeout_sec = Some(secs);
        self
    }

    /// Has this task exceeded `timeout_sec`, measured from `started_at`?
    /// Reporting only — enforcement is the agent's responsibility
    /// (spec §4.4).
    pub fn has_timed_out(&self) -> bool {
        match (self.started_at, self.timeout_sec) {
            (Some(started), Some(timeout)) => {
                let elapsed = (Utc::now() - started).num_seconds().max(0) as u64;
                elapsed >= timeout
            }
            _ => false,
        }
    }

    /// Read-only snapshot for inspection APIs (`get`/`peek`) that can't
    /// hand out the live, callback-bearing `Task` across the queue's lock
    /// boundary.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            description: self.description.clone(),
            task_type: self.task_type,
            priority: self.priority,
            state: self.state,
            dependencies: self.dependencies.clone(),
            dependencies_met: self.dependencies_met,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
            progress_pct: self.progress_pct,
        }
    }
}

/// Cloneable, callback-free view of a [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub state: TaskState,
    pub dependencies: Vec<String>,
    pub dependencies_met: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub progress_pct: u8,
}
