//! `tsc-analysis`: turns raw lane observations into allocation inputs.
//!
//! # Pipeline
//!
//! ```text
//! LaneObservation ──► QueueEstimator ──► QueueMetrics
//!        │                                   │
//!        └──────────────► LaneData ◄─────────┘  (+ wait time from the controller)
//!                            │
//!                            ▼
//!                     TrafficAnalyzer::analyze(lanes, &Conditions)
//!                            │
//!                            ▼
//!                  Analysis { scores, green_pool }
//! ```
//!
//! | Module           | Contents                                              |
//! |------------------|-------------------------------------------------------|
//! | [`queue`]        | `QueueEstimator`, `QueueMetrics`, clearance prediction |
//! | [`weights`]      | `VehicleWeights` (per-unit class multipliers)         |
//! | [`conditions`]   | `TimeOfDay`, `WeatherCondition`, `Conditions`          |
//! | [`analyzer`]     | `TrafficAnalyzer`, `LaneData`, `LaneScore`, `Analysis` |
//! | [`trend`]        | `TrendTracker`, `CongestionTrend`, `ThroughputTracker` |
//!
//! Nothing in this crate returns an error: missing or malformed lane data is
//! flagged on the resulting `LaneScore` and the allocator falls back to the
//! minimum green for that lane.

pub mod analyzer;
pub mod conditions;
pub mod queue;
pub mod trend;
pub mod weights;

#[cfg(test)]
mod tests;

pub use analyzer::{AnalyzerConfig, Analysis, LaneData, LaneScore, TrafficAnalyzer};
pub use conditions::{Conditions, TimeOfDay, TimingAdjustment, WeatherCondition};
pub use queue::{QueueEstimator, QueueMetrics, SATURATION_FLOW_VPH};
pub use trend::{CongestionTrend, ThroughputTracker, TrendTracker};
pub use weights::VehicleWeights;
