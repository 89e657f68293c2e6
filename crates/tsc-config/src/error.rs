use thiserror::Error;
use tsc_control::ControlError;
use tsc_network::NetworkError;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Every problem found in one file, not just the first.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("replay parse error at row {row}: {message}")]
    Replay { row: usize, message: String },

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
