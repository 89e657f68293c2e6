//! Displayed signal state of one movement.

use std::fmt;

/// What a movement's signal head shows.
///
/// The only legal sequence out of GREEN is GREEN → YELLOW → RED; a head is
/// never switched from GREEN straight to RED.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SignalState {
    /// The safe state.  Every head starts here.
    #[default]
    Red,
    Yellow,
    Green,
}

impl SignalState {
    /// `true` for GREEN and YELLOW, the states a driver may still enter on.
    #[inline]
    pub fn is_active(self) -> bool {
        !matches!(self, SignalState::Red)
    }

    /// Whether a head may move from `self` to `next` in one step.
    pub fn can_transition_to(self, next: SignalState) -> bool {
        matches!(
            (self, next),
            (SignalState::Red, SignalState::Green)
                | (SignalState::Green, SignalState::Yellow)
                | (SignalState::Yellow, SignalState::Red)
        ) || self == next
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalState::Red    => "red",
            SignalState::Yellow => "yellow",
            SignalState::Green  => "green",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SignalState {
    type Err = crate::TscError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red"    => Ok(SignalState::Red),
            "yellow" => Ok(SignalState::Yellow),
            "green"  => Ok(SignalState::Green),
            other    => Err(crate::TscError::Parse(format!("invalid signal state {other:?}"))),
        }
    }
}
