//! Crosswalk phase decisions and walk-signal display.

use std::fmt;
use std::time::Duration;

use tsc_analysis::LaneData;
use tsc_core::{MovementId, SignalState};

use crate::{IntersectionLayout, MovementKind};

/// What a pedestrian head shows.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WalkSignal {
    Walk,
    FlashingDontWalk,
    DontWalk,
}

impl From<SignalState> for WalkSignal {
    fn from(state: SignalState) -> Self {
        match state {
            SignalState::Green  => WalkSignal::Walk,
            SignalState::Yellow => WalkSignal::FlashingDontWalk,
            SignalState::Red    => WalkSignal::DontWalk,
        }
    }
}

impl fmt::Display for WalkSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalkSignal::Walk             => "walk",
            WalkSignal::FlashingDontWalk => "flashing_dont_walk",
            WalkSignal::DontWalk         => "dont_walk",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PedestrianDecision {
    pub movement: MovementId,
    pub count:    u32,
    /// Schedule a walk phase this cycle.
    pub include:  bool,
    pub crossing: Duration,
    pub starved:  bool,
}

#[derive(Clone, Debug)]
pub struct PedestrianEvaluator {
    pub activation_threshold: u32,
    pub walking_speed_mps:    f32,
    pub minimum_crossing:     Duration,
    pub starvation_threshold: Duration,
}

impl Default for PedestrianEvaluator {
    fn default() -> Self {
        Self {
            activation_threshold: 1,
            walking_speed_mps:    1.2,
            minimum_crossing:     Duration::from_secs(7),
            starvation_threshold: Duration::from_secs(180),
        }
    }
}

impl PedestrianEvaluator {
    /// `max(minimum_crossing, distance / walking_speed)`.
    pub fn crossing_time(&self, crossing_distance_m: f32) -> Duration {
        if self.walking_speed_mps <= 0.0 || !crossing_distance_m.is_finite() {
            return self.minimum_crossing;
        }
        let walk = Duration::from_secs_f32((crossing_distance_m / self.walking_speed_mps).max(0.0));
        walk.max(self.minimum_crossing)
    }

    pub fn evaluate(&self, layout: &IntersectionLayout, lanes: &[LaneData]) -> Vec<PedestrianDecision> {
        layout
            .pedestrian_movements()
            .filter_map(|m| {
                let MovementKind::Pedestrian { crossing_distance_m } = m.kind else {
                    return None;
                };
                let data: Vec<&LaneData> = lanes
                    .iter()
                    .filter(|d| d.valid && m.lanes.contains(&d.lane))
                    .collect();
                let count: u32 = data.iter().map(|d| d.pedestrian_count).sum();
                let starved = count > 0
                    && data.iter().any(|d| d.wait_time >= self.starvation_threshold);
                Some(PedestrianDecision {
                    movement: m.id,
                    count,
                    include: count >= self.activation_threshold.max(1) || starved,
                    crossing: self.crossing_time(crossing_distance_m),
                    starved,
                })
            })
            .collect()
    }
}
