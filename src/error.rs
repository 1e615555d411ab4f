use thiserror::Error;

/// Convenience type alias for Results with [`ForgeError`]
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Main error type for forgemesh-core.
///
/// Variants follow the error taxonomy of the orchestration spec: each
/// represents one class of failure a caller needs to distinguish, not one
/// call site.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("contention: {0}")]
    Contention(String),

    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("shut down: {0}")]
    Shutdown(String),

    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("executor failure: {0}")]
    ExecutorFailure(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
