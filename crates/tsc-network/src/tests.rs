//! Unit tests for tsc-network.

#[cfg(test)]
mod helpers {
    use std::sync::Arc;
    use std::time::Duration;

    use tsc_control::OffsetCell;
    use tsc_core::IntersectionId;

    use crate::{
        CoordinatorConfig, Corridor, MemberReport, NetworkCoordinator, NetworkTopology,
        TopologyBuilder,
    };

    pub fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    pub const A: IntersectionId = IntersectionId(1);
    pub const B: IntersectionId = IntersectionId(2);
    pub const C: IntersectionId = IntersectionId(3);

    /// A → B → C with the given travel times.
    pub fn line(ab: u64, bc: u64) -> NetworkTopology {
        let mut b = TopologyBuilder::new();
        b.add_intersection(A).add_intersection(B).add_intersection(C);
        b.connect_both(A, B, 400.0, Some(secs(ab)));
        b.connect_both(B, C, 400.0, Some(secs(bc)));
        b.corridor(Corridor::new("main", vec![A, B, C]).with_direction("eastbound"));
        b.build().unwrap()
    }

    /// Coordinator with every topology member registered; returns the cells
    /// in id order.
    pub fn coordinator(topology: NetworkTopology) -> (NetworkCoordinator, Vec<Arc<OffsetCell>>) {
        let ids = topology.nodes.clone();
        let mut c = NetworkCoordinator::new(topology, CoordinatorConfig::default()).unwrap();
        let cells: Vec<_> = ids
            .iter()
            .map(|&id| {
                let cell = OffsetCell::new();
                c.register(id, Arc::clone(&cell)).unwrap();
                cell
            })
            .collect();
        (c, cells)
    }

    pub fn report(id: IntersectionId, at: u64, cycle: u64) -> MemberReport {
        MemberReport {
            id,
            at: secs(at),
            cycle_time: secs(cycle),
            discharged: 10,
            throughput_vph: 600.0,
            safety_faults: 0,
        }
    }

    pub fn report_all(c: &mut NetworkCoordinator, ids: &[IntersectionId], at: u64, cycle: u64) {
        for &id in ids {
            c.report(report(id, at, cycle));
        }
    }
}

// ── Topology ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod topology {
    use tsc_core::IntersectionId;

    use crate::{Corridor, CorridorPriority, NetworkError, TopologyBuilder};

    use super::helpers::{A, B, C, line, secs};

    #[test]
    fn csr_links_and_travel_times() {
        let t = line(30, 45);
        assert_eq!(t.node_count(), 3);
        assert_eq!(t.link_count(), 4);
        assert_eq!(t.out_links(B).count(), 2);
        assert_eq!(t.out_links(IntersectionId(99)).count(), 0);

        let ab = t.link_between(A, B).unwrap();
        assert_eq!(t.travel_time(ab, 13.9), secs(30));
        assert!(t.link_between(A, C).is_none());
    }

    #[test]
    fn travel_time_derived_from_distance() {
        let mut b = TopologyBuilder::new();
        b.add_intersection(A).add_intersection(B);
        b.connect(A, B, 500.0, None);
        let t = b.build().unwrap();
        let l = t.link_between(A, B).unwrap();
        assert_eq!(t.travel_time(l, 10.0), secs(50));
    }

    #[test]
    fn corridors_of_member() {
        let t = line(30, 30);
        assert_eq!(t.corridors_of(B).count(), 1);
        assert_eq!(t.corridor("main").map(|c| c.direction.as_str()), Some("eastbound"));
        assert!(t.corridor("other").is_none());
    }

    #[test]
    fn build_collects_every_problem() {
        let mut b = TopologyBuilder::new();
        b.add_intersection(A).add_intersection(A).add_intersection(B);
        b.connect(A, IntersectionId(9), 100.0, None);
        b.connect(B, B, 0.0, None);
        b.corridor(Corridor::new("empty", vec![]));
        b.corridor(Corridor::new("gap", vec![A, B]));
        let Err(NetworkError::InvalidTopology(problems)) = b.build() else {
            panic!("expected InvalidTopology");
        };
        // duplicate A, unknown 9, self link, zero distance, empty corridor,
        // missing link A -> B
        assert_eq!(problems.len(), 6, "{problems:?}");
    }

    #[test]
    fn priority_parsing() {
        assert_eq!("HIGH".parse::<CorridorPriority>(), Ok(CorridorPriority::High));
        assert_eq!("medium".parse::<CorridorPriority>(), Ok(CorridorPriority::Normal));
        assert!("urgent".parse::<CorridorPriority>().is_err());
        assert!(CorridorPriority::High > CorridorPriority::Low);
        assert_eq!(CorridorPriority::default().to_string(), "normal");
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod coordinator {
    use std::sync::Arc;

    use tsc_control::OffsetCell;
    use tsc_core::IntersectionId;

    use crate::{
        CoordinatorConfig, Corridor, CorridorPriority, MemberHealth, NetworkCoordinator,
        NetworkError, TopologyBuilder,
    };

    use super::helpers::{A, B, C, coordinator, line, report, report_all, secs};

    #[test]
    fn two_member_offset_is_travel_time() {
        let mut b = TopologyBuilder::new();
        b.add_intersection(A).add_intersection(B);
        b.connect(A, B, 420.0, Some(secs(30)));
        b.corridor(Corridor::new("pair", vec![A, B]));
        let (mut c, cells) = coordinator(b.build().unwrap());

        report_all(&mut c, &[A, B], 0, 60);
        assert!(c.update(secs(0)).recomputed);
        assert_eq!(c.offset(A), Some(secs(0)));
        assert_eq!(c.offset(B), Some(secs(30)));
        assert_eq!(cells[1].get(), Some(secs(30)));
    }

    #[test]
    fn offsets_wrap_at_cycle_length() {
        let (mut c, _) = coordinator(line(90, 20));
        report_all(&mut c, &[A, B, C], 0, 60);
        c.update(secs(0));
        assert_eq!(c.offset(B), Some(secs(30)));
        // (30 + 20) mod 60
        assert_eq!(c.offset(C), Some(secs(50)));
    }

    #[test]
    fn degraded_member_is_skipped_and_travel_accumulates() {
        let (mut c, cells) = coordinator(line(20, 30));
        report_all(&mut c, &[A, B, C], 0, 60);
        c.update(secs(0));
        assert_eq!(c.offset(C), Some(secs(50)));

        // B goes silent.
        report_all(&mut c, &[A, C], 40, 60);
        let up = c.update(secs(40));
        assert_eq!(up.degraded, vec![B]);
        assert!(up.recomputed);
        assert_eq!(c.health(B), Some(MemberHealth::Degraded));
        assert_eq!(c.offset(B), None);
        assert_eq!(cells[1].get(), None);
        // (0 + 20 + 30) mod 60
        assert_eq!(c.offset(C), Some(secs(50)));
        assert_eq!(c.corridor_offsets()[0].skipped, vec![B]);
        assert_eq!(c.degraded(), vec![B]);
    }

    #[test]
    fn degraded_member_restored_on_report() {
        let (mut c, cells) = coordinator(line(20, 30));
        report_all(&mut c, &[A, B, C], 0, 60);
        c.update(secs(0));
        report_all(&mut c, &[A, C], 40, 60);
        c.update(secs(40));

        report_all(&mut c, &[A, B, C], 45, 60);
        let up = c.update(secs(45));
        assert_eq!(up.restored, vec![B]);
        assert!(up.recomputed);
        assert_eq!(c.health(B), Some(MemberHealth::Active));
        assert_eq!(cells[1].get(), Some(secs(20)));
    }

    #[test]
    fn small_cycle_drift_is_tolerated() {
        let (mut c, _) = coordinator(line(30, 30));
        report_all(&mut c, &[A, B, C], 0, 60);
        assert!(c.update(secs(0)).recomputed);

        report_all(&mut c, &[A, B, C], 40, 63);
        assert!(!c.update(secs(40)).recomputed);
        assert_eq!(c.offset(C), Some(secs(0)));
    }

    #[test]
    fn large_drift_waits_for_min_reoptimize() {
        let (mut c, _) = coordinator(line(30, 30));
        report_all(&mut c, &[A, B, C], 0, 60);
        c.update(secs(0));

        report_all(&mut c, &[A, B, C], 10, 70);
        assert!(!c.update(secs(10)).recomputed);

        report_all(&mut c, &[A, B, C], 30, 70);
        assert!(c.update(secs(30)).recomputed);
        assert_eq!(c.offset(B), Some(secs(30)));
        // (30 + 30) mod 70
        assert_eq!(c.offset(C), Some(secs(60)));
        assert_eq!(c.metrics().recomputations, 2);
    }

    #[test]
    fn higher_priority_corridor_owns_shared_member() {
        let mut b = TopologyBuilder::new();
        b.add_intersection(A).add_intersection(B).add_intersection(C);
        b.connect(A, B, 400.0, Some(secs(30)));
        b.connect(C, B, 400.0, Some(secs(10)));
        b.corridor(Corridor::new("cross", vec![C, B]).with_priority(CorridorPriority::Low));
        b.corridor(Corridor::new("arterial", vec![A, B]).with_priority(CorridorPriority::High));
        let (mut c, _) = coordinator(b.build().unwrap());

        report_all(&mut c, &[A, B, C], 0, 60);
        c.update(secs(0));
        assert_eq!(c.offset(B), Some(secs(30)));
        assert_eq!(c.offset(C), Some(secs(0)));
        assert_eq!(c.corridor_offsets()[0].corridor, "arterial");
    }

    #[test]
    fn disabled_coordinator_writes_nothing() {
        let topology = line(30, 30);
        let config = CoordinatorConfig { enabled: false, ..CoordinatorConfig::default() };
        let mut c = NetworkCoordinator::new(topology, config).unwrap();
        let cell = OffsetCell::new();
        c.register(B, Arc::clone(&cell)).unwrap();
        c.report(report(B, 0, 60));
        assert!(!c.update(secs(0)).recomputed);
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn registration_errors() {
        let (mut c, _) = coordinator(line(30, 30));
        assert!(matches!(
            c.register(A, OffsetCell::new()),
            Err(NetworkError::DuplicateIntersection(_))
        ));
        assert!(matches!(
            c.register(IntersectionId(42), OffsetCell::new()),
            Err(NetworkError::UnknownIntersection(_))
        ));
    }

    #[test]
    fn config_validation() {
        let bad = CoordinatorConfig { target_speed_mps: 0.0, ..CoordinatorConfig::default() };
        assert!(matches!(bad.validate(), Err(NetworkError::InvalidConfig(_))));
    }

    #[test]
    fn update_cadence() {
        let (mut c, _) = coordinator(line(30, 30));
        assert!(c.is_due(secs(0)));
        c.update(secs(0));
        assert!(!c.is_due(secs(4)));
        assert!(c.is_due(secs(5)));
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod metrics {
    use super::helpers::{A, B, C, coordinator, line, report_all, secs};

    #[test]
    fn no_trips_means_zero_quality() {
        let (c, _) = coordinator(line(30, 30));
        let m = c.metrics();
        assert_eq!(m.coordination_quality, 0.0);
        assert_eq!(m.average_travel_time, secs(0));
    }

    #[test]
    fn quality_from_stops_per_vehicle() {
        let (mut c, _) = coordinator(line(30, 30));
        c.record_trip(secs(100), 0);
        c.record_trip(secs(140), 1);
        let m = c.metrics();
        assert_eq!(m.average_travel_time, secs(120));
        assert_eq!(m.stops_per_vehicle, 0.5);
        assert_eq!(m.coordination_quality, 0.75);

        c.reset_metrics();
        c.record_trip(secs(200), 3);
        assert_eq!(c.metrics().coordination_quality, 0.25);

        c.reset_metrics();
        c.record_trip(secs(200), 6);
        assert_eq!(c.metrics().coordination_quality, 0.0);
    }

    #[test]
    fn mean_travel_time_survives_huge_trip_counts() {
        use crate::coordinator::mean_duration;

        assert_eq!(mean_duration(secs(0), 0), secs(0));
        let trips = 1u64 << 32;
        assert_eq!(mean_duration(secs(trips * 60), trips), secs(60));
        assert_eq!(mean_duration(secs(90), 4), std::time::Duration::from_millis(22_500));
    }

    #[test]
    fn throughput_sums_member_reports() {
        let (mut c, _) = coordinator(line(30, 30));
        report_all(&mut c, &[A, B, C], 0, 60);
        let m = c.metrics();
        assert_eq!(m.total_throughput, 30);
        assert_eq!(m.throughput_vph, 1800.0);
        assert_eq!(m.active_members, 3);
        assert_eq!(m.degraded_members, 0);
    }
}

// ── Runner ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod runner {
    use tsc_control::{ControllerBuilder, NoopObserver, SignalController};
    use tsc_core::{ControlClock, IntersectionId, LaneId, LaneObservation, ObservationFrame, Tick};
    use tsc_phase::LayoutBuilder;

    use crate::{
        CoordinatorConfig, Corridor, MemberHealth, NetworkCoordinator, NetworkRunner,
        TopologyBuilder,
    };

    use super::helpers::{A, B, secs};

    fn clock() -> ControlClock {
        ControlClock::new(secs(1), 11 * 3_600)
    }

    fn controller(id: IntersectionId) -> SignalController {
        let mut b = LayoutBuilder::new(id, format!("node-{}", id.0));
        let mut ms = Vec::new();
        for name in ["north", "south", "east", "west"] {
            let m = b.through(name);
            b.lane(format!("{name}_1"), m, 60.0);
            ms.push(m);
        }
        for (x, y) in [(ms[0], ms[2]), (ms[0], ms[3]), (ms[1], ms[2]), (ms[1], ms[3])] {
            b.conflict(x, y);
        }
        let c = ControllerBuilder::new(b.build().unwrap()).clock(clock()).build().unwrap();
        let mut f = ObservationFrame::new(Tick(0));
        for (lane, n) in [(0, 12), (1, 3), (2, 0), (3, 5)] {
            f.push(LaneObservation::new(LaneId(lane), n));
        }
        c.publish(f);
        c
    }

    fn runner() -> NetworkRunner {
        let mut t = TopologyBuilder::new();
        t.add_intersection(A).add_intersection(B);
        t.connect_both(A, B, 420.0, Some(secs(30)));
        t.corridor(Corridor::new("pair", vec![A, B]));
        let coordinator =
            NetworkCoordinator::new(t.build().unwrap(), CoordinatorConfig::default()).unwrap();
        let mut r = NetworkRunner::new(coordinator, clock());
        r.add(controller(A)).unwrap();
        r.add(controller(B)).unwrap();
        r
    }

    #[test]
    fn first_step_publishes_offsets() {
        let mut r = runner();
        let tick = r.step();
        assert_eq!(tick.reports.len(), 2);
        assert!(tick.coordination.is_some_and(|u| u.recomputed));
        assert_eq!(r.coordinator().offset(B), Some(secs(30)));
        assert_eq!(r.controller(B).unwrap().offset_cell().get(), Some(secs(30)));
    }

    #[test]
    fn offsets_applied_at_next_cycle() {
        let mut r = runner();
        r.run_ticks(300, &mut NoopObserver);
        for id in [A, B] {
            let c = r.controller(id).unwrap();
            assert_eq!(c.safety_faults(), 0);
            assert!(c.cycle() >= 2);
        }
        assert_eq!(r.controller(B).unwrap().snapshot().applied_offset, secs(30));
    }

    #[test]
    fn offline_controller_degrades() {
        let mut r = runner();
        r.run_ticks(10, &mut NoopObserver);
        r.set_online(B, false).unwrap();
        let frozen = r.controller(B).unwrap().clock.current_tick;

        r.run_ticks(40, &mut NoopObserver);
        assert_eq!(r.coordinator().health(B), Some(MemberHealth::Degraded));
        assert_eq!(r.controller(B).unwrap().offset_cell().get(), None);
        assert_eq!(r.controller(B).unwrap().clock.current_tick, frozen);
        assert_eq!(r.coordinator().metrics().degraded_members, 1);

        r.set_online(B, true).unwrap();
        assert_eq!(r.controller(B).unwrap().clock.current_tick, r.clock.current_tick);
        assert_eq!(r.controller(B).unwrap().snapshot().applied_offset, secs(0));
        r.run_ticks(6, &mut NoopObserver);
        assert_eq!(r.coordinator().health(B), Some(MemberHealth::Active));
        assert_eq!(r.controller(B).unwrap().offset_cell().get(), Some(secs(30)));
        assert_eq!(r.controller(B).unwrap().clock.elapsed(), r.clock.elapsed());

        r.run_ticks(300, &mut NoopObserver);
        assert_eq!(r.controller(B).unwrap().clock.elapsed(), r.clock.elapsed());
        assert_eq!(r.controller(B).unwrap().snapshot().applied_offset, secs(30));
        assert_eq!(r.controller(B).unwrap().safety_faults(), 0);
    }

    #[test]
    fn unknown_member_rejected() {
        let mut r = runner();
        assert!(r.add(controller(IntersectionId(7))).is_err());
        assert!(r.set_online(IntersectionId(7), false).is_err());
    }
}
