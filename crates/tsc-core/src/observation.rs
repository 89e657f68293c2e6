//! Detection contract: what the ingestion side hands the controller each tick.
//!
//! Observations are immutable snapshots.  A controller picks up the most
//! recent complete `ObservationFrame` at the start of its tick and never
//! mutates it.

use crate::{LaneId, Tick, VehicleClass, VehicleMix};

/// One lane's detection output for one analysis tick.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneObservation {
    pub lane:             LaneId,
    pub vehicle_count:    u32,
    pub vehicle_types:    VehicleMix,
    /// Waiting pedestrians, meaningful only for lanes that own a crosswalk.
    pub pedestrian_count: u32,
    /// Class of an emergency vehicle seen in the lane's clearance region.
    pub emergency:        Option<VehicleClass>,
    /// Distances (m) from the stop line, nearest first.
    pub positions:        Vec<f32>,
}

impl LaneObservation {
    pub fn new(lane: LaneId, vehicle_count: u32) -> Self {
        Self { lane, vehicle_count, ..Self::default() }
    }

    pub fn with_types(mut self, mix: VehicleMix) -> Self {
        self.vehicle_types = mix;
        self
    }

    pub fn with_positions(mut self, positions: Vec<f32>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_pedestrians(mut self, n: u32) -> Self {
        self.pedestrian_count = n;
        self
    }

    pub fn with_emergency(mut self, class: VehicleClass) -> Self {
        self.emergency = Some(class);
        self
    }

    #[inline]
    pub fn emergency_present(&self) -> bool {
        self.emergency.is_some()
    }

    /// Whether the snapshot is usable for allocation.
    ///
    /// A lane with a sentinel id or non-finite / negative positions is treated
    /// as missing data by the analyzer.
    pub fn is_valid(&self) -> bool {
        self.lane != LaneId::INVALID
            && self.positions.iter().all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// All lane observations for one intersection at one tick.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationFrame {
    pub tick:  Tick,
    pub lanes: Vec<LaneObservation>,
}

impl ObservationFrame {
    pub fn new(tick: Tick) -> Self {
        Self { tick, lanes: Vec::new() }
    }

    pub fn push(&mut self, obs: LaneObservation) {
        self.lanes.push(obs);
    }

    pub fn with(mut self, obs: LaneObservation) -> Self {
        self.lanes.push(obs);
        self
    }

    /// Observation for `lane`, if the frame carries one.
    pub fn get(&self, lane: LaneId) -> Option<&LaneObservation> {
        self.lanes.iter().find(|o| o.lane == lane)
    }

    /// Lanes that report an emergency vehicle this tick.
    pub fn emergencies(&self) -> impl Iterator<Item = &LaneObservation> {
        self.lanes.iter().filter(|o| o.emergency_present())
    }
}
