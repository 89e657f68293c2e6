use thiserror::Error;
use tsc_core::TscError;
use tsc_phase::PhaseError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid controller configuration: {0}")]
    InvalidConfig(String),

    #[error("layout error: {0}")]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Core(#[from] TscError),
}

pub type ControlResult<T> = Result<T, ControlError>;
