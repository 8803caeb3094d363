use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenBcError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Collective returned {got} values, expected {expected}")]
    CollectiveMismatch { expected: usize, got: usize },

    #[error("Region bounds violated: {0}")]
    BoundsViolation(String),

    #[error("Boundary solver failed: {0}")]
    SolverFailure(String),

    #[error("Communication error on worker {worker}: {message}")]
    CommError { worker: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type OpenBcResult<T> = Result<T, OpenBcError>;
