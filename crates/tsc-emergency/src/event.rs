use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tsc_core::{LaneId, TscError, VehicleClass};

/// How events detected on the same tick are ordered.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TieBreak {
    /// Lane order within the observation frame.
    #[default]
    DetectionOrder,
    /// Lower priority level first (ambulance, fire, police).
    VehicleClass,
    /// Nearest reported vehicle position first.
    Proximity,
}

impl FromStr for TieBreak {
    type Err = TscError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detection_order" => Ok(TieBreak::DetectionOrder),
            "vehicle_class"   => Ok(TieBreak::VehicleClass),
            "proximity"       => Ok(TieBreak::Proximity),
            other => Err(TscError::Parse(format!("unknown tie-break policy {other:?}"))),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClearReason {
    /// Not observed for the debounce window.
    Unobserved,
    /// Held for the hard maximum.
    MaxHold,
    /// Cleared by command.
    Manual,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClearReason::Unobserved => "unobserved",
            ClearReason::MaxHold    => "max_hold",
            ClearReason::Manual     => "manual",
        };
        f.write_str(s)
    }
}

/// One emergency vehicle's claim on a lane.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmergencyEvent {
    /// Monotonic detection sequence number.
    pub seq:            u64,
    pub vehicle:        VehicleClass,
    pub lane:           LaneId,
    /// Lower is more urgent.
    pub priority_level: u8,
    pub active:         bool,
    pub first_seen:     Duration,
    pub last_seen:      Duration,
    /// Control time the event took ownership of the intersection.
    pub activated_at:   Option<Duration>,
    /// Nearest reported vehicle position in the lane (m).
    pub distance_m:     f32,
    /// Raised by command rather than by detection.
    pub manual:         bool,
}

impl EmergencyEvent {
    pub(crate) fn new(seq: u64, vehicle: VehicleClass, lane: LaneId, now: Duration, distance_m: f32) -> Self {
        Self {
            seq,
            vehicle,
            lane,
            priority_level: vehicle.priority_level().unwrap_or(u8::MAX),
            active: false,
            first_seen: now,
            last_seen: now,
            activated_at: None,
            distance_m,
            manual: false,
        }
    }

    /// Time the event has owned the intersection.
    pub fn held_for(&self, now: Duration) -> Duration {
        self.activated_at
            .map(|t| now.saturating_sub(t))
            .unwrap_or_default()
    }
}
