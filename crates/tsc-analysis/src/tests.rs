//! Unit tests for tsc-analysis.

#[cfg(test)]
mod queue {
    use std::time::Duration;

    use crate::QueueEstimator;

    #[test]
    fn empty_lane_is_zero_queue() {
        let m = QueueEstimator::default().estimate(&[], 50.0);
        assert_eq!(m.vehicle_count, 0);
        assert_eq!(m.length_m, 0.0);
        assert!(!m.spillback);
    }

    #[test]
    fn single_vehicle_has_zero_length() {
        let m = QueueEstimator::default().estimate(&[3.0], 50.0);
        assert_eq!(m.vehicle_count, 1);
        assert_eq!(m.length_m, 0.0);
        assert_eq!(m.density, 0.0);
    }

    #[test]
    fn first_large_gap_ends_queue() {
        let est = QueueEstimator::new(10.0);
        let m = est.estimate(&[2.0, 8.0, 15.0, 40.0, 45.0], 100.0);
        assert_eq!(m.vehicle_count, 3);
        assert!((m.length_m - 13.0).abs() < 1e-4);
        assert!((m.density - 3.0 / 13.0).abs() < 1e-4);
        assert_eq!(m.head_m, 2.0);
        assert_eq!(m.tail_m, 15.0);
    }

    #[test]
    fn unsorted_positions_are_sorted() {
        let est = QueueEstimator::new(10.0);
        let m = est.estimate(&[15.0, 2.0, 8.0], 100.0);
        assert_eq!(m.vehicle_count, 3);
        assert_eq!(m.head_m, 2.0);
    }

    #[test]
    fn spillback_at_capacity() {
        let est = QueueEstimator::new(10.0);
        let at = est.estimate(&[0.0, 5.0, 10.0, 15.0, 20.0], 20.0);
        let under = est.estimate(&[0.0, 5.0, 10.0], 20.0);
        let unknown = est.estimate(&[0.0, 5.0, 10.0, 15.0, 20.0], 0.0);
        assert!(at.spillback);
        assert!(!under.spillback);
        assert!(!unknown.spillback);
    }

    #[test]
    fn clearance_at_saturation_flow() {
        let est = QueueEstimator::new(10.0);
        let m = est.estimate(&[0.0, 5.0, 10.0, 15.0, 20.0], 100.0);
        // 5 vehicles at 0.5 veh/s
        let t = est.clearance_time(&m);
        assert!((t.as_secs_f32() - 10.0).abs() < 1e-3);
        assert_eq!(est.clearance_time(&Default::default()), Duration::ZERO);
    }
}

#[cfg(test)]
mod weights {
    use tsc_core::{VehicleClass, VehicleMix};

    use crate::VehicleWeights;

    #[test]
    fn bus_plus_cars_outranks_cars_alone() {
        let w = VehicleWeights::default();
        let cars = VehicleMix::new().with(VehicleClass::Car, 4);
        let with_bus = cars.clone().with(VehicleClass::Bus, 1);
        assert!(w.weigh(5, &with_bus) > w.weigh(4, &cars));
    }

    #[test]
    fn unclassified_vehicles_use_default_weight() {
        let w = VehicleWeights::default();
        let mix = VehicleMix::new().with(VehicleClass::Truck, 2);
        // 2 trucks at 1.5 plus 3 unclassified at 1.0
        assert!((w.weigh(5, &mix) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_weights_ignored() {
        let mut w = VehicleWeights::uniform();
        w.set(VehicleClass::Bus, -3.0);
        w.set(VehicleClass::Truck, f32::NAN);
        assert_eq!(w.get(VehicleClass::Bus), 1.0);
        assert_eq!(w.get(VehicleClass::Truck), 1.0);
    }
}

#[cfg(test)]
mod conditions {
    use crate::{Conditions, TimeOfDay, WeatherCondition};

    #[test]
    fn time_of_day_bands() {
        let h = |h: u32, m: u32| h * 3_600 + m * 60;
        assert_eq!(TimeOfDay::from_seconds_of_day(h(8, 0)), TimeOfDay::PeakMorning);
        assert_eq!(TimeOfDay::from_seconds_of_day(h(9, 30)), TimeOfDay::PeakMorning);
        assert_eq!(TimeOfDay::from_seconds_of_day(h(17, 15)), TimeOfDay::PeakEvening);
        assert_eq!(TimeOfDay::from_seconds_of_day(h(23, 0)), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_seconds_of_day(h(3, 0)), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_seconds_of_day(h(12, 0)), TimeOfDay::OffPeak);
    }

    #[test]
    fn multipliers_compose() {
        let c = Conditions::new(TimeOfDay::PeakEvening, WeatherCondition::HeavyRain);
        assert!((c.adjustment().green_multiplier - 1.32).abs() < 1e-5);
        assert_eq!(Conditions::default().adjustment().green_multiplier, 1.0);
    }
}

#[cfg(test)]
mod analyzer {
    use std::time::Duration;

    use tsc_core::LaneId;

    use crate::{AnalyzerConfig, Conditions, LaneData, TimeOfDay, TrafficAnalyzer, VehicleWeights, WeatherCondition};

    fn lane(id: u32, count: u32) -> LaneData {
        LaneData { lane: LaneId(id), vehicle_count: count, valid: true, ..LaneData::default() }
    }

    fn analyzer() -> TrafficAnalyzer {
        TrafficAnalyzer::new(AnalyzerConfig::default(), VehicleWeights::uniform())
    }

    #[test]
    fn ratios_sum_to_one() {
        let lanes = [lane(0, 12), lane(1, 3), lane(2, 0), lane(3, 5)];
        let a = analyzer().analyze(&lanes, Duration::from_secs(60), &Conditions::default());
        let sum: f32 = a.scores.iter().map(|s| s.ratio).sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((a.get(LaneId(0)).unwrap().ratio - 0.6).abs() < 1e-5);
        assert_eq!(a.get(LaneId(2)).unwrap().ratio, 0.0);
    }

    #[test]
    fn all_zero_scores_share_equally() {
        let lanes = [lane(0, 0), lane(1, 0), lane(2, 0), lane(3, 0)];
        let a = analyzer().analyze(&lanes, Duration::from_secs(60), &Conditions::default());
        for s in &a.scores {
            assert!((s.ratio - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn invalid_lane_falls_back() {
        let missing = LaneData::missing(LaneId(1), Duration::ZERO, Duration::ZERO);
        let a = analyzer().analyze(&[lane(0, 4), missing], Duration::from_secs(60), &Conditions::default());
        let m = a.get(LaneId(1)).unwrap();
        assert!(m.fallback);
        assert_eq!(m.ratio, 0.0);
        assert!((a.get(LaneId(0)).unwrap().ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fairness_grows_with_time_since_green() {
        let an = analyzer();
        let early = an.fairness(Duration::from_secs(60));
        let later = an.fairness(Duration::from_secs(150));
        let latest = an.fairness(Duration::from_secs(200));
        assert_eq!(early, 0.0);
        assert!(later > early);
        assert!(latest > later);
    }

    #[test]
    fn starvation_requires_demand() {
        let an = analyzer();
        let mut l = lane(0, 2);
        l.wait_time = Duration::from_secs(200);
        assert!(an.is_starved(&l));
        l.vehicle_count = 0;
        assert!(!an.is_starved(&l));
    }

    #[test]
    fn conditions_scale_pool() {
        let c = Conditions::new(TimeOfDay::Night, WeatherCondition::Clear);
        let a = analyzer().analyze(&[lane(0, 1)], Duration::from_secs(100), &c);
        assert!((a.green_pool.as_secs_f32() - 70.0).abs() < 1e-3);
    }
}

#[cfg(test)]
mod trend {
    use std::time::Duration;

    use tsc_core::LaneId;

    use crate::{CongestionTrend, ThroughputTracker, TrendTracker};

    #[test]
    fn needs_three_samples() {
        let mut t = TrendTracker::default();
        assert_eq!(t.record(LaneId(0), 1.0), CongestionTrend::Stable);
        assert_eq!(t.record(LaneId(0), 5.0), CongestionTrend::Stable);
        assert_eq!(t.record(LaneId(0), 9.0), CongestionTrend::Worsening);
    }

    #[test]
    fn improving_and_stable() {
        let mut t = TrendTracker::default();
        for v in [10.0, 10.0, 5.0, 4.0] {
            t.record(LaneId(1), v);
        }
        assert_eq!(t.trend(LaneId(1)), CongestionTrend::Improving);
        for v in [3.0, 3.0, 3.0, 3.0] {
            t.record(LaneId(2), v);
        }
        assert_eq!(t.trend(LaneId(2)), CongestionTrend::Stable);
    }

    #[test]
    fn throughput_per_hour() {
        let mut tp = ThroughputTracker::new(Duration::from_secs(3_600));
        tp.record(LaneId(0), Duration::from_secs(10), 5);
        tp.record(LaneId(0), Duration::from_secs(20), 5);
        // 10 vehicles in 100 s of control time
        let v = tp.throughput(LaneId(0), Duration::from_secs(100));
        assert!((v - 360.0).abs() < 1e-2);
    }

    #[test]
    fn throughput_window_prunes() {
        let mut tp = ThroughputTracker::new(Duration::from_secs(60));
        tp.record(LaneId(0), Duration::from_secs(10), 5);
        tp.record(LaneId(0), Duration::from_secs(100), 2);
        let v = tp.throughput(LaneId(0), Duration::from_secs(120));
        assert!((v - 120.0).abs() < 1e-2);
        assert_eq!(tp.total_vehicles(), 2);
    }

    #[test]
    fn saturation_limit() {
        assert_eq!(ThroughputTracker::saturation_limit(Duration::from_secs(10)), 5);
    }
}
