//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `TscError` as one
//! variant via `#[from]`.

use thiserror::Error;

use crate::{IntersectionId, LaneId};

/// The top-level error type for `tsc-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum TscError {
    #[error("lane {0} not found")]
    LaneNotFound(LaneId),

    #[error("intersection {0} not found")]
    IntersectionNotFound(IntersectionId),

    #[error("unknown vehicle class {0:?}")]
    UnknownVehicleClass(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for all `tsc-*` crates.
pub type TscResult<T> = Result<T, TscError>;
