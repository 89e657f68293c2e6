use thiserror::Error;
use tsc_core::TscError;

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("layout declares no movements, so no safe all-red state can be left")]
    NoMovements,

    #[error("movement {0:?} is declared in conflict with itself")]
    SelfConflict(String),

    #[error("turn {turn:?} conflicts with its parent movement {parent:?}")]
    ParentConflict { turn: String, parent: String },

    #[error("movement {0:?} owns no lanes")]
    EmptyMovement(String),

    #[error("unknown movement {0:?}")]
    UnknownMovement(String),

    #[error("duplicate name {0:?}")]
    DuplicateName(String),

    #[error("too many movements: {0} (limit {max})", max = crate::MovementSet::CAPACITY)]
    TooManyMovements(usize),

    #[error(transparent)]
    Core(#[from] TscError),
}

pub type PhaseResult<T> = Result<T, PhaseError>;
