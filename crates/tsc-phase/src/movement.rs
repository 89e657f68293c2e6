//! Movements and the lanes that feed them.

use std::fmt;

use tsc_core::{LaneId, MovementId};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TurnKind {
    Left,
    Right,
    /// Never protected; always served inside the parent phase.
    UTurn,
}

/// What a movement is.  Kind-specific data lives in the variant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MovementKind {
    /// Straight-through approach traffic.
    Through,
    /// Dedicated turn bay.  Runs permissively with `parent` unless its demand
    /// earns a protected phase.
    Turn { turn: TurnKind, parent: MovementId },
    /// Crosswalk.
    Pedestrian { crossing_distance_m: f32 },
}

impl MovementKind {
    pub fn is_pedestrian(&self) -> bool {
        matches!(self, MovementKind::Pedestrian { .. })
    }

    pub fn parent(&self) -> Option<MovementId> {
        match self {
            MovementKind::Turn { parent, .. } => Some(*parent),
            _ => None,
        }
    }
}

/// A named group of lanes that may be non-RED together.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Movement {
    pub id:    MovementId,
    pub name:  String,
    pub kind:  MovementKind,
    pub lanes: Vec<LaneId>,
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LaneRole {
    Approach,
    TurnBay,
    Crosswalk,
}

/// One detection zone.  Every lane feeds exactly one movement.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lane {
    pub id:         LaneId,
    pub name:       String,
    pub movement:   MovementId,
    pub role:       LaneRole,
    /// Physical storage length (m); zero when unknown.
    pub capacity_m: f32,
}
