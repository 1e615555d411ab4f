//! External executor adapters (spec §6, SPEC_FULL §4.7). Real executors —
//! talking to an LLM backend or a build-command templating layer — are out
//! of scope (spec §1); only these narrow trait contracts live here, plus a
//! `MockExecutor` for `mock_mode`.

/// Structured result returned by a [`SmartExecutor`].
#[derive(Debug, Clone)]
pub struct SmartResult {
    pub output: String,
    pub error: Option<String>,
}

/// Result returned by a [`BuildExecutor`].
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub success: bool,
    pub log: String,
    pub exit_code: Option<i32>,
}

pub trait SmartExecutor: Send + Sync {
    fn execute(&self, description: &str) -> Result<SmartResult, String>;
}

pub trait AutonomousExecutor: Send + Sync {
    fn execute(&self, description: &str) -> Result<String, String>;
}

pub trait BuildExecutor: Send + Sync {
    fn build(&self, project_path: &str) -> Result<BuildResult, String>;
}

/// Stands in for every executor kind when `AgentConfig::mock_mode` is set
/// (spec §4.5 `run_sync`: "returns a canned string and counts the task as
/// a success").
#[derive(Debug, Default, Clone, Copy)]
pub struct MockExecutor;

impl SmartExecutor for MockExecutor {
    fn execute(&self, description: &str) -> Result<SmartResult, String> {
        Ok(SmartResult {
            output: format!("[mock smart result for: {description}]"),
            error: None,
        })
    }
}

impl AutonomousExecutor for MockExecutor {
    fn execute(&self, description: &str) -> Result<String, String> {
        Ok(format!("[mock autonomous output for: {description}]"))
    }
}

impl BuildExecutor for MockExecutor {
    fn build(&self, project_path: &str) -> Result<BuildResult, String> {
        Ok(BuildResult {
            success: true,
            log: format!("[mock build of: {project_path}]"),
            exit_code: Some(0),
        })
    }
}

/// The trio of executors an agent may dispatch to, selected by
/// [`super::AgentType`] at `run_sync`/`run_async` time. `Arc`-held rather
/// than `Box`-held so the registry can capture the same executors in the
/// `'static` job a worker-pool thread runs for `run_async`.
pub struct Executors {
    pub smart: std::sync::Arc<dyn SmartExecutor>,
    pub autonomous: std::sync::Arc<dyn AutonomousExecutor>,
    pub build: std::sync::Arc<dyn BuildExecutor>,
}

impl Executors {
    pub fn mock() -> Self {
        Self {
            smart: std::sync::Arc::new(MockExecutor),
            autonomous: std::sync::Arc::new(MockExecutor),
            build: std::sync::Arc::new(MockExecutor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_executor_always_succeeds() {
        let mock = MockExecutor;
        assert!(SmartExecutor::execute(&mock, "task").is_ok());
        assert!(AutonomousExecutor::execute(&mock, "task").is_ok());
        assert!(mock.build("proj").unwrap().success);
    }
}
