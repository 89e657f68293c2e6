//! Unit tests for tsc-phase.

#[cfg(test)]
mod helpers {
    use tsc_core::IntersectionId;

    use crate::{IntersectionLayout, LayoutBuilder, TurnKind};

    /// Four approaches, a left-turn bay off north, and one crosswalk across
    /// east/west.  North/south conflict with east/west.
    pub fn four_way() -> IntersectionLayout {
        let mut b = LayoutBuilder::new(IntersectionId(0), "test");
        let n = b.through("north");
        b.lane("north_1", n, 60.0);
        let s = b.through("south");
        b.lane("south_1", s, 60.0);
        let e = b.through("east");
        b.lane("east_1", e, 60.0);
        let w = b.through("west");
        b.lane("west_1", w, 60.0);
        let nl = b.turn("north_left", TurnKind::Left, n);
        b.lane("north_left_1", nl, 30.0);
        let cw = b.crosswalk("ew_crosswalk", 14.4);
        for &(a, c) in &[(n, e), (n, w), (s, e), (s, w), (nl, s), (nl, e), (nl, w), (cw, e), (cw, w), (cw, nl)] {
            b.conflict(a, c);
        }
        b.build().unwrap()
    }
}

#[cfg(test)]
mod conflict {
    use tsc_core::MovementId;

    use crate::{ConflictTable, MovementSet};

    #[test]
    fn set_ops() {
        let mut s = MovementSet::EMPTY;
        s.insert(MovementId(0));
        s.insert(MovementId(5));
        s.insert(MovementId(63));
        assert_eq!(s.len(), 3);
        assert!(s.contains(MovementId(63)));
        assert!(!s.contains(MovementId(1)));
        assert!(!s.contains(MovementId(200)));
        let ids: Vec<u16> = s.iter().map(|m| m.0).collect();
        assert_eq!(ids, vec![0, 5, 63]);
        s.remove(MovementId(5));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn table_is_symmetric() {
        let mut t = ConflictTable::new(3);
        t.add(MovementId(0), MovementId(2));
        assert!(t.conflicts(MovementId(0), MovementId(2)));
        assert!(t.conflicts(MovementId(2), MovementId(0)));
        assert!(!t.conflicts(MovementId(0), MovementId(1)));
    }

    #[test]
    fn violation_detected() {
        let mut t = ConflictTable::new(3);
        t.add(MovementId(0), MovementId(1));
        let ok: MovementSet = [MovementId(0), MovementId(2)].into_iter().collect();
        let bad: MovementSet = [MovementId(0), MovementId(1)].into_iter().collect();
        assert!(t.is_compatible(ok));
        assert_eq!(t.violation(bad), Some((MovementId(0), MovementId(1))));
    }
}

#[cfg(test)]
mod layout {
    use tsc_core::{IntersectionId, LaneId};

    use crate::{LaneRole, LayoutBuilder, PhaseError, TurnKind};

    use super::helpers::four_way;

    #[test]
    fn lanes_map_to_movements() {
        let l = four_way();
        let n = l.movement_by_name("north").unwrap().id;
        assert_eq!(l.movement_of(LaneId(0)), Some(n));
        assert_eq!(l.lane_by_name("north_left_1").unwrap().role, LaneRole::TurnBay);
        assert_eq!(l.lane_by_name("ew_crosswalk").unwrap().role, LaneRole::Crosswalk);
        assert_eq!(l.turns_of(n).count(), 1);
        assert_eq!(l.pedestrian_movements().count(), 1);
    }

    #[test]
    fn empty_layout_rejected() {
        let b = LayoutBuilder::new(IntersectionId(0), "empty");
        assert!(matches!(b.build(), Err(PhaseError::NoMovements)));
    }

    #[test]
    fn self_conflict_rejected() {
        let mut b = LayoutBuilder::new(IntersectionId(0), "bad");
        let n = b.through("north");
        b.lane("n1", n, 10.0);
        b.conflict(n, n);
        assert!(matches!(b.build(), Err(PhaseError::SelfConflict(name)) if name == "north"));
    }

    #[test]
    fn turn_conflicting_with_parent_rejected() {
        let mut b = LayoutBuilder::new(IntersectionId(0), "bad");
        let n = b.through("north");
        b.lane("n1", n, 10.0);
        let nl = b.turn("north_left", TurnKind::Left, n);
        b.lane("nl1", nl, 10.0);
        b.conflict(nl, n);
        assert!(matches!(b.build(), Err(PhaseError::ParentConflict { .. })));
    }

    #[test]
    fn movement_without_lanes_rejected() {
        let mut b = LayoutBuilder::new(IntersectionId(0), "bad");
        b.through("north");
        assert!(matches!(b.build(), Err(PhaseError::EmptyMovement(_))));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut b = LayoutBuilder::new(IntersectionId(0), "bad");
        let n = b.through("north");
        b.lane("n1", n, 10.0);
        b.lane("n1", n, 10.0);
        assert!(matches!(b.build(), Err(PhaseError::DuplicateName(_))));
    }
}

#[cfg(test)]
mod plan {
    use std::time::Duration;

    use crate::{MovementSet, PhaseKind, SignalPhase, SignalPlan};

    use super::helpers::four_way;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn cycle_time_sums_all_intervals() {
        let l = four_way();
        let n = l.movement_by_name("north").unwrap().id;
        let e = l.movement_by_name("east").unwrap().id;
        let mut plan = SignalPlan::new(1);
        plan.push(SignalPhase::new(n, PhaseKind::Through, secs(30), secs(3), secs(2)));
        plan.push(SignalPhase::new(e, PhaseKind::Through, secs(10), secs(3), secs(2)));
        assert_eq!(plan.total_cycle_time(), secs(50));
        assert_eq!(plan.green_for(e), Some(secs(10)));
        assert_eq!(plan.position(e), Some(1));
        assert!(plan.verify(&l.conflicts).is_none());
    }

    #[test]
    fn verify_flags_conflicting_companion() {
        let l = four_way();
        let n = l.movement_by_name("north").unwrap().id;
        let e = l.movement_by_name("east").unwrap().id;
        let mut plan = SignalPlan::new(1);
        plan.push(
            SignalPhase::new(n, PhaseKind::Through, secs(30), secs(3), secs(0))
                .with_companions(MovementSet::single(e)),
        );
        assert!(plan.verify(&l.conflicts).is_some());
    }

    #[test]
    fn companions_exclude_primary() {
        let l = four_way();
        let n = l.movement_by_name("north").unwrap().id;
        let p = SignalPhase::new(n, PhaseKind::Through, secs(10), secs(3), secs(0))
            .with_companions(MovementSet::single(n));
        assert!(p.companions.is_empty());
        assert_eq!(p.active().len(), 1);
    }
}

#[cfg(test)]
mod turn {
    use std::time::Duration;

    use tsc_analysis::LaneData;
    use tsc_core::LaneId;

    use crate::TurnEvaluator;

    use super::helpers::four_way;

    fn turn_lane(count: u32, wait_s: u64) -> LaneData {
        LaneData {
            lane:          LaneId(4),
            vehicle_count: count,
            wait_time:     Duration::from_secs(wait_s),
            valid:         true,
            ..LaneData::default()
        }
    }

    #[test]
    fn below_threshold_is_permissive() {
        let l = four_way();
        let d = TurnEvaluator::default().evaluate(&l, &[turn_lane(2, 0)]);
        assert_eq!(d.len(), 1);
        assert!(!d[0].protected);
        assert_eq!(d[0].green, Duration::ZERO);
    }

    #[test]
    fn at_threshold_is_protected() {
        let l = four_way();
        let d = TurnEvaluator::default().evaluate(&l, &[turn_lane(3, 0)]);
        assert!(d[0].protected);
        // 3 turners discharge in 6 s, clamped up to the 10 s minimum
        assert_eq!(d[0].green, Duration::from_secs(10));
    }

    #[test]
    fn green_clamped_to_maximum() {
        let e = TurnEvaluator::default();
        assert_eq!(e.green_for(100), Duration::from_secs(60));
        assert_eq!(e.green_for(8), Duration::from_secs(16));
    }

    #[test]
    fn starved_turn_is_protected() {
        let l = four_way();
        let d = TurnEvaluator::default().evaluate(&l, &[turn_lane(1, 200)]);
        assert!(d[0].starved);
        assert!(d[0].protected);
    }

    #[test]
    fn missing_data_stays_permissive() {
        let l = four_way();
        let d = TurnEvaluator::default().evaluate(&l, &[]);
        assert_eq!(d[0].demand, 0);
        assert!(!d[0].protected);
    }
}

#[cfg(test)]
mod pedestrian {
    use std::time::Duration;

    use tsc_analysis::LaneData;
    use tsc_core::{LaneId, SignalState};

    use crate::{PedestrianEvaluator, WalkSignal};

    use super::helpers::four_way;

    #[test]
    fn crossing_time_uses_walking_speed() {
        let e = PedestrianEvaluator { walking_speed_mps: 1.5, ..PedestrianEvaluator::default() };
        assert_eq!(e.crossing_time(18.0), Duration::from_secs(12));
        assert_eq!(e.crossing_time(3.0), Duration::from_secs(7));
    }

    #[test]
    fn included_at_threshold() {
        let l = four_way();
        let cw = LaneData { lane: LaneId(5), pedestrian_count: 2, valid: true, ..LaneData::default() };
        let e = PedestrianEvaluator { activation_threshold: 2, ..PedestrianEvaluator::default() };
        let d = e.evaluate(&l, &[cw.clone()]);
        assert!(d[0].include);
        let d = e.evaluate(&l, &[LaneData { pedestrian_count: 1, ..cw }]);
        assert!(!d[0].include);
    }

    #[test]
    fn walk_signal_mapping() {
        assert_eq!(WalkSignal::from(SignalState::Green), WalkSignal::Walk);
        assert_eq!(WalkSignal::from(SignalState::Yellow), WalkSignal::FlashingDontWalk);
        assert_eq!(WalkSignal::from(SignalState::Red), WalkSignal::DontWalk);
    }
}
