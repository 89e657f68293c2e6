//! Unit tests for tsc-core primitives.

#[cfg(test)]
mod ids {
    use crate::{IntersectionId, LaneId, MovementId};

    #[test]
    fn index_roundtrip() {
        let id = LaneId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(LaneId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn movement_id_rejects_overflow() {
        assert!(MovementId::try_from(70_000usize).is_err());
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(LaneId::INVALID.0, u32::MAX);
        assert_eq!(MovementId::INVALID.0, u16::MAX);
        assert_eq!(IntersectionId::default(), IntersectionId::INVALID);
    }

    #[test]
    fn display() {
        assert_eq!(IntersectionId(3).to_string(), "IntersectionId(3)");
    }
}

#[cfg(test)]
mod time {
    use std::time::Duration;

    use crate::{ControlClock, Tick};

    #[test]
    fn tick_arithmetic() {
        let t = Tick(10);
        assert_eq!(t + 5, Tick(15));
        assert_eq!(t.offset(3), Tick(13));
        assert_eq!(Tick(15) - Tick(10), 5u64);
        assert_eq!(Tick(3).since(Tick(10)), 0);
    }

    #[test]
    fn tick_difference_saturates() {
        assert_eq!(Tick(3) - Tick(10), 0);
        assert_eq!(Tick(0) - Tick(u64::MAX), 0);
        assert_eq!(Tick(u64::MAX) - Tick(0), u64::MAX);
    }

    #[test]
    fn clock_elapsed() {
        let mut clock = ControlClock::new(Duration::from_millis(500), 0);
        clock.advance();
        clock.advance();
        clock.advance();
        assert_eq!(clock.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn ticks_for_rounds_up() {
        let clock = ControlClock::new(Duration::from_secs(1), 0);
        assert_eq!(clock.ticks_for(Duration::from_secs(3)), 3);
        assert_eq!(clock.ticks_for(Duration::from_millis(2_100)), 3);
        assert_eq!(clock.ticks_for(Duration::ZERO), 0);
    }

    #[test]
    fn zero_tick_duration_is_replaced() {
        let clock = ControlClock::new(Duration::ZERO, 0);
        assert!(!clock.tick_duration.is_zero());
    }

    #[test]
    fn seconds_of_day_wraps() {
        let mut clock = ControlClock::new(Duration::from_secs(3_600), 23 * 3_600);
        clock.advance();
        clock.advance();
        assert_eq!(clock.seconds_of_day(), 3_600);
        assert_eq!(clock.to_string(), "T2 (01:00:00)");
    }
}

#[cfg(test)]
mod signal {
    use crate::SignalState;

    #[test]
    fn legal_transitions() {
        assert!(SignalState::Red.can_transition_to(SignalState::Green));
        assert!(SignalState::Green.can_transition_to(SignalState::Yellow));
        assert!(SignalState::Yellow.can_transition_to(SignalState::Red));
    }

    #[test]
    fn green_never_skips_yellow() {
        assert!(!SignalState::Green.can_transition_to(SignalState::Red));
        assert!(!SignalState::Red.can_transition_to(SignalState::Yellow));
    }

    #[test]
    fn parse() {
        assert_eq!("GREEN".parse::<SignalState>().unwrap(), SignalState::Green);
        assert!("blue".parse::<SignalState>().is_err());
    }
}

#[cfg(test)]
mod vehicle {
    use crate::{VehicleClass, VehicleMix};

    #[test]
    fn priority_levels() {
        assert_eq!(VehicleClass::Ambulance.priority_level(), Some(1));
        assert_eq!(VehicleClass::FireTruck.priority_level(), Some(2));
        assert_eq!(VehicleClass::Police.priority_level(), Some(3));
        assert!(!VehicleClass::Bus.is_emergency());
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("Fire-Truck".parse::<VehicleClass>().unwrap(), VehicleClass::FireTruck);
        assert_eq!("bike".parse::<VehicleClass>().unwrap(), VehicleClass::Bicycle);
        assert!("tank".parse::<VehicleClass>().is_err());
    }

    #[test]
    fn mix_totals() {
        let mix = VehicleMix::new()
            .with(VehicleClass::Car, 4)
            .with(VehicleClass::Bus, 1)
            .with(VehicleClass::Car, 2)
            .with(VehicleClass::Truck, 0);
        assert_eq!(mix.count(VehicleClass::Car), 6);
        assert_eq!(mix.count(VehicleClass::Truck), 0);
        assert_eq!(mix.total(), 7);
    }

    #[test]
    fn most_urgent_emergency() {
        let mix: VehicleMix = [(VehicleClass::Police, 1), (VehicleClass::Ambulance, 1)]
            .into_iter()
            .collect();
        assert_eq!(mix.most_urgent_emergency(), Some(VehicleClass::Ambulance));
    }
}

#[cfg(test)]
mod observation {
    use crate::{LaneId, LaneObservation, ObservationFrame, Tick, VehicleClass};

    #[test]
    fn invalid_positions_mark_lane_invalid() {
        let ok = LaneObservation::new(LaneId(0), 2).with_positions(vec![1.0, 8.0]);
        let bad = LaneObservation::new(LaneId(0), 2).with_positions(vec![1.0, f32::NAN]);
        assert!(ok.is_valid());
        assert!(!bad.is_valid());
        assert!(!LaneObservation::new(LaneId::INVALID, 0).is_valid());
    }

    #[test]
    fn frame_lookup() {
        let frame = ObservationFrame::new(Tick(4))
            .with(LaneObservation::new(LaneId(0), 3))
            .with(LaneObservation::new(LaneId(2), 1).with_emergency(VehicleClass::Ambulance));
        assert_eq!(frame.get(LaneId(2)).map(|o| o.vehicle_count), Some(1));
        assert!(frame.get(LaneId(1)).is_none());
        assert_eq!(frame.emergencies().count(), 1);
    }
}
