//! `tsc-network`: green-wave coordination across signal controllers.
//!
//! | Module          | Contents                                                 |
//! |-----------------|----------------------------------------------------------|
//! | [`topology`]    | `NetworkTopology` (CSR links), `Corridor`, builder       |
//! | [`coordinator`] | `NetworkCoordinator`: offsets, member health, metrics    |
//! | [`runner`]      | `NetworkRunner`: ticks controllers, feeds the coordinator |
//! | [`error`]       | `NetworkError`, `NetworkResult`                          |
//!
//! Controllers and the coordinator share nothing but each controller's
//! [`OffsetCell`][tsc_control::OffsetCell].  A controller keeps running its
//! own adaptive cycle whether or not the coordinator is alive.
//!
//! # Feature flags
//!
//! | Feature    | Effect                                                      |
//! |------------|-------------------------------------------------------------|
//! | `parallel` | `NetworkRunner::step` ticks controllers with Rayon          |
//! | `fx-hash`  | FxHash for id-keyed maps                                    |
//! | `serde`    | `Serialize`/`Deserialize` on corridors, reports and metrics |

pub mod coordinator;
pub mod error;
pub mod runner;
pub mod topology;

#[cfg(test)]
mod tests;

pub use coordinator::{
    CoordinationUpdate, CoordinatorConfig, CorridorOffsets, MemberHealth, MemberReport,
    NetworkCoordinator, NetworkMetrics,
};
pub use error::{NetworkError, NetworkResult};
pub use runner::{NetworkRunner, NetworkTick};
pub use topology::{Corridor, CorridorPriority, NetworkTopology, TopologyBuilder};

#[cfg(feature = "fx-hash")]
pub(crate) type IdMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[cfg(not(feature = "fx-hash"))]
pub(crate) type IdMap<K, V> = std::collections::HashMap<K, V>;
