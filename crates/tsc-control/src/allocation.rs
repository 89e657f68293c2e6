//! One cycle's green allocation.
//!
//! # Ordering
//!
//! 1. Protected turn phases, in movement order.
//! 2. Through phases, longest green first (ties by movement id).
//! 3. Pedestrian demand rides along as a companion of the first through
//!    phase that does not conflict with the crosswalk and is long enough to
//!    cover the crossing; otherwise it gets an exclusive phase placed right
//!    after the last phase it conflicts with.
//!
//! Turns that did not earn a protected phase run as companions of their
//! parent through phase.

use std::time::Duration;

use tracing::{debug, warn};
use tsc_analysis::Analysis;
use tsc_core::MovementId;
use tsc_phase::{
    IntersectionLayout, MovementSet, PedestrianDecision, PhaseKind, SignalPhase, SignalPlan,
    TurnDecision,
};

use crate::ControllerConfig;

/// Green for one through movement: the movement's share of the pool,
/// clamped into the configured bounds.  Movements whose lanes all lack data
/// get exactly `minimum_green`.
pub fn movement_green(
    layout: &IntersectionLayout,
    config: &ControllerConfig,
    analysis: &Analysis,
    movement: MovementId,
) -> Duration {
    let Some(m) = layout.movement(movement) else {
        return config.minimum_green;
    };
    let scores: Vec<_> = m.lanes.iter().filter_map(|&l| analysis.get(l)).collect();
    if scores.is_empty() || scores.iter().all(|s| s.fallback) {
        return config.minimum_green;
    }
    let ratio: f32 = scores.iter().filter(|s| !s.fallback).map(|s| s.ratio).sum();
    let raw = analysis.green_pool.mul_f32(ratio.clamp(0.0, 1.0));
    let green = config.clamp_green(raw);
    if green != raw {
        debug!(movement = %m.name, ?raw, ?green, "green clamped to bounds");
    }
    green
}

/// Build the plan for cycle `cycle`.
pub fn build_plan(
    layout: &IntersectionLayout,
    config: &ControllerConfig,
    analysis: &Analysis,
    turns: &[TurnDecision],
    pedestrians: &[PedestrianDecision],
    cycle: u64,
) -> SignalPlan {
    let phase = |m, kind, green| SignalPhase::new(m, kind, green, config.yellow, config.all_red);
    let mut plan = SignalPlan::new(cycle);

    for t in turns.iter().filter(|t| t.protected) {
        plan.push(phase(t.movement, PhaseKind::ProtectedTurn, config.clamp_green(t.green)));
    }

    let mut through: Vec<(MovementId, Duration)> = layout
        .through_movements()
        .map(|m| (m.id, movement_green(layout, config, analysis, m.id)))
        .collect();
    through.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (m, green) in through {
        plan.push(phase(m, PhaseKind::Through, green));
    }

    for t in turns.iter().filter(|t| !t.protected) {
        let conflicts = layout.conflicts.of(t.movement);
        if let Some(p) = plan
            .phases
            .iter_mut()
            .find(|p| p.movement == t.parent && p.kind == PhaseKind::Through)
        {
            if conflicts.intersection(p.active()).is_empty() {
                p.companions.insert(t.movement);
            }
        }
    }

    for d in pedestrians.iter().filter(|d| d.include) {
        let conflicts = layout.conflicts.of(d.movement);
        let rider = plan.phases.iter_mut().find(|p| {
            p.kind == PhaseKind::Through
                && p.green >= d.crossing
                && conflicts.intersection(p.active()).is_empty()
        });
        if let Some(p) = rider {
            p.companions.insert(d.movement);
            continue;
        }
        let green = config.clamp_green(d.crossing);
        if green < d.crossing {
            warn!(movement = %d.movement, crossing = ?d.crossing, "crossing time exceeds maximum green");
        }
        let at = plan
            .phases
            .iter()
            .rposition(|p| !conflicts.intersection(p.active()).is_empty())
            .map(|i| i + 1)
            .unwrap_or(plan.phases.len());
        plan.phases.insert(at, phase(d.movement, PhaseKind::Pedestrian, green));
    }

    if let Some((a, b)) = plan.verify(&layout.conflicts) {
        // Companions are only added after a compatibility check, so this
        // means the layout itself is inconsistent.  Fall back to bare phases.
        warn!(%a, %b, "allocated plan violates conflicts; dropping companions");
        for p in &mut plan.phases {
            p.companions = MovementSet::EMPTY;
        }
    }
    plan
}
