//! Protected/permissive decision for dedicated turn lanes.

use std::time::Duration;

use tsc_analysis::{LaneData, SATURATION_FLOW_VPH};
use tsc_core::MovementId;

use crate::{IntersectionLayout, MovementKind, TurnKind};

/// Outcome for one turn movement this cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnDecision {
    pub movement:  MovementId,
    pub parent:    MovementId,
    pub demand:    u32,
    /// Scheduled as its own phase; otherwise a companion of `parent`.
    pub protected: bool,
    /// GREEN for the protected phase; zero when permissive.
    pub green:     Duration,
    pub starved:   bool,
}

#[derive(Clone, Debug)]
pub struct TurnEvaluator {
    /// Minimum queued turners that earn a protected phase.
    pub activation_threshold: u32,
    pub minimum_green:        Duration,
    pub maximum_green:        Duration,
    /// Waiting turners older than this get a protected phase regardless of demand.
    pub starvation_threshold: Duration,
}

impl Default for TurnEvaluator {
    fn default() -> Self {
        Self {
            activation_threshold: 3,
            minimum_green:        Duration::from_secs(10),
            maximum_green:        Duration::from_secs(60),
            starvation_threshold: Duration::from_secs(180),
        }
    }
}

impl TurnEvaluator {
    /// Time to discharge `demand` turners at saturation flow, clamped to the
    /// green bounds.
    pub fn green_for(&self, demand: u32) -> Duration {
        let secs = demand as f32 * 3_600.0 / SATURATION_FLOW_VPH;
        Duration::from_secs_f32(secs)
            .max(self.minimum_green)
            .min(self.maximum_green)
    }

    /// Decide every turn movement of `layout` from this cycle's lane data.
    ///
    /// Lanes missing from `lanes` or flagged invalid contribute no demand, so
    /// their turn stays permissive.
    pub fn evaluate(&self, layout: &IntersectionLayout, lanes: &[LaneData]) -> Vec<TurnDecision> {
        layout
            .turn_movements()
            .filter_map(|m| {
                let MovementKind::Turn { turn, parent } = m.kind else {
                    return None;
                };
                let data: Vec<&LaneData> = lanes
                    .iter()
                    .filter(|d| d.valid && m.lanes.contains(&d.lane))
                    .collect();
                let demand: u32 = data.iter().map(|d| d.vehicle_count).sum();
                let starved = demand > 0
                    && data.iter().any(|d| d.wait_time >= self.starvation_threshold);
                let protected = turn != TurnKind::UTurn
                    && (demand >= self.activation_threshold.max(1) || starved);
                Some(TurnDecision {
                    movement: m.id,
                    parent,
                    demand,
                    protected,
                    green: if protected { self.green_for(demand) } else { Duration::ZERO },
                    starved,
                })
            })
            .collect()
    }
}
