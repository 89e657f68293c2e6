use thiserror::Error;
use tsc_control::ControlError;
use tsc_core::IntersectionId;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("unknown intersection {0}")]
    UnknownIntersection(IntersectionId),

    #[error("intersection {0} registered twice")]
    DuplicateIntersection(IntersectionId),

    #[error("invalid topology: {}", .0.join("; "))]
    InvalidTopology(Vec<String>),

    #[error("invalid coordinator configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Control(#[from] ControlError),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
