//! Read-only views for monitoring.

use std::time::Duration;

use tsc_analysis::{CongestionTrend, QueueMetrics};
use tsc_core::{IntersectionId, LaneId, MovementId, SignalState, Tick};
use tsc_emergency::EmergencyEvent;
use tsc_phase::{SignalPlan, WalkSignal};

/// Where a controller is inside its cycle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stage {
    /// Next phase waiting for the coordinated cycle start, or for an
    /// override beside the previous phase to clear.
    SyncHold,
    Green,
    Yellow,
    /// Clearance after YELLOW; also the initial safe state.
    AllRed,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementStatus {
    pub movement:  MovementId,
    pub name:      String,
    pub state:     SignalState,
    /// Set for crosswalk movements.
    pub walk:      Option<WalkSignal>,
    /// Time left in the current state; `None` for RED or a held GREEN.
    pub remaining: Option<Duration>,
}

/// Per-lane analysis from the most recent allocation.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneStatus {
    pub lane:          LaneId,
    pub vehicle_count: u32,
    pub queue:         QueueMetrics,
    pub score:         f32,
    pub ratio:         f32,
    pub wait_time:     Duration,
    pub starved:       bool,
    pub fallback:      bool,
    pub trend:         CongestionTrend,
}

/// Everything the monitoring side can see about one controller.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerSnapshot {
    pub intersection:   IntersectionId,
    pub tick:           Tick,
    pub cycle:          u64,
    pub stage:          Stage,
    pub phase_index:    usize,
    /// Time spent in the current stage.
    pub elapsed:        Duration,
    pub plan:           SignalPlan,
    pub movements:      Vec<MovementStatus>,
    pub lanes:          Vec<LaneStatus>,
    pub emergency:      Option<EmergencyEvent>,
    pub applied_offset: Duration,
    /// Vehicles per hour over the throughput window, all lanes.
    pub throughput_vph: f32,
    pub safety_faults:  u64,
}
