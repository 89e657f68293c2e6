//! `tsc-phase`: intersection geometry as seen by the signal controller.
//!
//! An intersection is an arena of [`Movement`]s, each owning one or more
//! detection lanes.  Safety is expressed as a symmetric [`ConflictTable`]
//! of 64-bit movement masks: two conflicting movements may never be non-RED
//! at the same instant.
//!
//! | Module         | Contents                                                  |
//! |----------------|-----------------------------------------------------------|
//! | [`movement`]   | `Movement`, `MovementKind`, `TurnKind`, `Lane`, `LaneRole` |
//! | [`conflict`]   | `MovementSet` bitset, `ConflictTable`                      |
//! | [`layout`]     | `IntersectionLayout`, `LayoutBuilder` (validated)          |
//! | [`plan`]       | `SignalPhase`, `PhaseKind`, `SignalPlan`                   |
//! | [`turn`]       | `TurnEvaluator`, `TurnDecision`                            |
//! | [`pedestrian`] | `PedestrianEvaluator`, `PedestrianDecision`, `WalkSignal`  |
//!
//! # Safe state
//!
//! Every layout must admit the global all-red state and must be able to
//! leave it.  `LayoutBuilder::build` rejects a layout with no movements, a
//! movement declared in conflict with itself, or a turn declared in conflict
//! with its own parent.

pub mod conflict;
pub mod error;
pub mod layout;
pub mod movement;
pub mod pedestrian;
pub mod plan;
pub mod turn;

#[cfg(test)]
mod tests;

pub use conflict::{ConflictTable, MovementSet};
pub use error::{PhaseError, PhaseResult};
pub use layout::{IntersectionLayout, LayoutBuilder};
pub use movement::{Lane, LaneRole, Movement, MovementKind, TurnKind};
pub use pedestrian::{PedestrianDecision, PedestrianEvaluator, WalkSignal};
pub use plan::{PhaseKind, SignalPhase, SignalPlan};
pub use turn::{TurnDecision, TurnEvaluator};
