//! `tsc-core`: foundational types for the adaptive signal control framework.
//!
//! This crate is a dependency of every other `tsc-*` crate.  It has no `tsc-*`
//! dependencies and minimal external ones (only `thiserror`, plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`ids`]         | `IntersectionId`, `LaneId`, `MovementId`, `LinkId`         |
//! | [`time`]        | `Tick`, `ControlClock`                                     |
//! | [`signal`]      | `SignalState`                                              |
//! | [`vehicle`]     | `VehicleClass`, `VehicleMix`                               |
//! | [`observation`] | `LaneObservation`, `ObservationFrame` (detection contract) |
//! | [`error`]       | `TscError`, `TscResult`                                    |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |
//!           | Required by `tsc-config`.                                  |

pub mod error;
pub mod ids;
pub mod observation;
pub mod signal;
pub mod time;
pub mod vehicle;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{TscError, TscResult};
pub use ids::{IntersectionId, LaneId, LinkId, MovementId};
pub use observation::{LaneObservation, ObservationFrame};
pub use signal::SignalState;
pub use time::{ControlClock, Tick};
pub use vehicle::{VehicleClass, VehicleMix};
