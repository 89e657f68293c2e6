//! Ordered phase plans.

use std::fmt;
use std::time::Duration;

use tsc_core::MovementId;

use crate::{ConflictTable, MovementSet};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PhaseKind {
    Through,
    ProtectedTurn,
    Pedestrian,
    /// Held GREEN until the emergency arbiter releases it.
    Emergency,
    /// One-off manual GREEN.
    Override,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseKind::Through       => "through",
            PhaseKind::ProtectedTurn => "protected_turn",
            PhaseKind::Pedestrian    => "pedestrian",
            PhaseKind::Emergency     => "emergency",
            PhaseKind::Override      => "override",
        };
        f.write_str(s)
    }
}

/// One movement's scheduled GREEN, its fixed YELLOW tail, and the all-red
/// clearance that follows.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalPhase {
    pub movement:   MovementId,
    pub kind:       PhaseKind,
    pub green:      Duration,
    pub yellow:     Duration,
    pub all_red:    Duration,
    /// Movements shown alongside `movement` (permissive turns).
    pub companions: MovementSet,
}

impl SignalPhase {
    pub fn new(
        movement: MovementId,
        kind: PhaseKind,
        green: Duration,
        yellow: Duration,
        all_red: Duration,
    ) -> Self {
        Self { movement, kind, green, yellow, all_red, companions: MovementSet::EMPTY }
    }

    pub fn with_companions(mut self, companions: MovementSet) -> Self {
        self.companions = companions;
        self.companions.remove(self.movement);
        self
    }

    /// Every movement this phase turns non-RED.
    #[inline]
    pub fn active(&self) -> MovementSet {
        self.companions.union(MovementSet::single(self.movement))
    }

    /// GREEN + YELLOW + all-red.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.green + self.yellow + self.all_red
    }
}

/// The ordered sequence of phases making up one cycle.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalPlan {
    pub phases:             Vec<SignalPhase>,
    /// Set while an emergency phase owns the intersection.
    pub emergency_override: bool,
    /// Cycle counter of the controller that produced this plan.
    pub cycle:              u64,
}

impl SignalPlan {
    pub fn new(cycle: u64) -> Self {
        Self { phases: Vec::new(), emergency_override: false, cycle }
    }

    pub fn push(&mut self, phase: SignalPhase) {
        self.phases.push(phase);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn total_cycle_time(&self) -> Duration {
        self.phases.iter().map(SignalPhase::duration).sum()
    }

    /// Allocated GREEN of the phase serving `movement` as its primary.
    pub fn green_for(&self, movement: MovementId) -> Option<Duration> {
        self.phases
            .iter()
            .find(|p| p.movement == movement)
            .map(|p| p.green)
    }

    pub fn position(&self, movement: MovementId) -> Option<usize> {
        self.phases.iter().position(|p| p.movement == movement)
    }

    /// First phase whose active set breaks the conflict relation.
    pub fn verify(&self, conflicts: &ConflictTable) -> Option<(MovementId, MovementId)> {
        self.phases.iter().find_map(|p| conflicts.violation(p.active()))
    }
}
