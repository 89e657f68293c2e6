//! Unit tests for tsc-config.

#[cfg(test)]
mod helpers {
    use std::time::Duration;

    use tsc_core::ControlClock;

    pub fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    pub fn clock() -> ControlClock {
        ControlClock::new(secs(1), 11 * 3_600)
    }

    pub const INTERSECTION: &str = r#"{
        "intersection": { "id": 7, "name": "Main & 1st" },
        "lanes": {
            "north_1": { "direction": "north", "capacity_m": 80 },
            "north_2": { "direction": "north" },
            "south_1": { "direction": "south" },
            "east_1":  { "direction": "east" },
            "west_1":  { "direction": "west" }
        },
        "turn_lanes": {
            "north_left": { "turn": "left", "parent": "north", "conflicts": ["south", "east", "west"] }
        },
        "crosswalks": {
            "ew_crossing": { "crossing_distance_m": 14.4, "conflicts": ["east", "west", "north_left"] }
        },
        "conflicts": [["north", "east"], ["north", "west"], ["south", "east"], ["south", "west"]],
        "signal_timing": { "yellow_s": 4, "all_red_s": 1.5 },
        "thresholds": { "turn_activation": 4 },
        "emergency": { "tie_break": "vehicle_class", "max_hold_s": 90 },
        "vehicle_weights": { "bus": 2.5 },
        "weather": "rain"
    }"#;

    /// Two-approach body used inside network files.
    pub fn small_body(name: &str) -> String {
        format!(
            r#"{{
                "intersection": {{ "name": "{name}" }},
                "lanes": {{
                    "east_1":  {{ "direction": "east" }},
                    "north_1": {{ "direction": "north" }}
                }},
                "conflicts": [["north", "east"]]
            }}"#
        )
    }

    pub fn network(extra: &str) -> String {
        format!(
            r#"{{
                "network": {{ "name": "pair" {extra} }},
                "intersections": {{ "1": {a}, "2": {b} }},
                "connections": [
                    {{ "from": 1, "to": 2, "distance_m": 420, "travel_time_s": 30, "bidirectional": true }}
                ],
                "corridors": [
                    {{ "name": "main", "intersections": [1, 2], "direction": "eastbound", "priority": "high" }}
                ]
            }}"#,
            a = small_body("west end"),
            b = small_body("east end"),
        )
    }
}

// ── Intersection files ────────────────────────────────────────────────────────

#[cfg(test)]
mod intersection {
    use std::io::Write;

    use tsc_analysis::WeatherCondition;
    use tsc_core::{IntersectionId, VehicleClass};
    use tsc_emergency::TieBreak;
    use tsc_phase::LaneRole;

    use crate::{ConfigError, load_intersection, parse_intersection};

    use super::helpers::{INTERSECTION, clock, secs};

    #[test]
    fn full_file_resolves() {
        let setup = parse_intersection(INTERSECTION).unwrap();
        let layout = &setup.layout;
        assert_eq!(layout.id, IntersectionId(7));
        assert_eq!(layout.movements.len(), 6);
        assert_eq!(layout.lanes.len(), 7);

        let north = layout.movement_by_name("north").unwrap().id;
        assert_eq!(layout.lane_by_name("north_2").unwrap().movement, north);
        assert_eq!(layout.lane_by_name("north_left").unwrap().role, LaneRole::TurnBay);
        assert_eq!(layout.lane_by_name("ew_crossing").unwrap().role, LaneRole::Crosswalk);

        let east = layout.movement_by_name("east").unwrap().id;
        assert!(layout.conflicts.conflicts(north, east));

        let c = &setup.config;
        assert_eq!(c.yellow, secs(4));
        assert_eq!(c.all_red.as_millis(), 1_500);
        assert_eq!(c.minimum_green, secs(10));
        assert_eq!(c.turn_activation, 4);
        assert_eq!(c.emergency.tie_break, TieBreak::VehicleClass);
        assert_eq!(c.emergency.max_hold, secs(90));
        assert_eq!(c.weights.get(VehicleClass::Bus), 2.5);
        assert_eq!(c.weights.get(VehicleClass::Truck), 1.5);
        assert_eq!(c.weather, WeatherCondition::Rain);

        let controller = setup.controller(clock()).unwrap();
        assert_eq!(controller.id(), IntersectionId(7));
    }

    #[test]
    fn every_problem_is_reported() {
        let json = r#"{
            "intersection": { "id": 3 },
            "lanes": { "north_1": { "direction": "north" }, "east_1": { "direction": "east" } },
            "turn_lanes": { "north_left": { "turn": "left", "parent": "nowhere" } },
            "conflicts": [["north", "sideways"]],
            "signal_timing": { "minimum_green_s": 70, "maximum_green_s": 60, "yellow_s": 0 },
            "emergency": { "tie_break": "loudest" },
            "vehicle_weights": { "tank": 3.0 }
        }"#;
        let Err(ConfigError::Invalid(problems)) = parse_intersection(json) else {
            panic!("expected Invalid");
        };
        assert_eq!(problems.len(), 6, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("nowhere")));
        assert!(problems.iter().any(|p| p.contains("sideways")));
        assert!(problems.iter().any(|p| p.contains("yellow")));
        assert!(problems.iter().any(|p| p.contains("exceeds maximum_green")));
    }

    #[test]
    fn negative_duration_rejected() {
        let json = r#"{
            "intersection": { "id": 3 },
            "lanes": { "north_1": { "direction": "north" } },
            "signal_timing": { "all_red_s": -1 }
        }"#;
        let Err(ConfigError::Invalid(problems)) = parse_intersection(json) else {
            panic!("expected Invalid");
        };
        assert_eq!(problems.len(), 1, "{problems:?}");
        assert!(problems[0].contains("all_red_s"));
    }

    #[test]
    fn id_is_required() {
        let json = r#"{ "lanes": { "north_1": { "direction": "north" } } }"#;
        assert!(matches!(parse_intersection(json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(parse_intersection("{ lanes: "), Err(ConfigError::Json(_))));
    }

    #[test]
    fn load_from_disk() {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(INTERSECTION.as_bytes()).unwrap();
        let setup = load_intersection(f.path()).unwrap();
        assert_eq!(setup.layout.name, "Main & 1st");

        assert!(matches!(
            load_intersection(std::path::Path::new("/no/such/file.json")),
            Err(ConfigError::Io(_))
        ));
    }
}

// ── Network files ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod network {
    use tsc_core::{IntersectionId, LaneId, LaneObservation, ObservationFrame, Tick};
    use tsc_network::CorridorPriority;

    use crate::{ConfigError, parse_network};

    use super::helpers::{clock, network, secs, small_body};

    #[test]
    fn network_resolves() {
        let setup = parse_network(&network(r#", "cycle_tolerance_s": 8"#)).unwrap();
        assert_eq!(setup.name, "pair");
        assert_eq!(setup.intersections.len(), 2);
        assert_eq!(setup.intersections[1].layout.id, IntersectionId(2));
        assert_eq!(setup.topology.link_count(), 2);
        let main = setup.topology.corridor("main").unwrap();
        assert_eq!(main.priority, CorridorPriority::High);
        assert_eq!(main.direction, "eastbound");
        assert_eq!(setup.coordinator.cycle_tolerance, secs(8));
        assert_eq!(setup.coordinator.min_reoptimize, secs(30));
    }

    #[test]
    fn runner_from_file_coordinates() {
        let setup = parse_network(&network("")).unwrap();
        let mut runner = setup.into_runner(clock()).unwrap();
        for id in [IntersectionId(1), IntersectionId(2)] {
            let frame = ObservationFrame::new(Tick(0))
                .with(LaneObservation::new(LaneId(0), 5))
                .with(LaneObservation::new(LaneId(1), 8));
            runner.controller(id).unwrap().publish(frame);
        }
        runner.step();
        assert_eq!(runner.coordinator().offset(IntersectionId(1)), Some(secs(0)));
        assert_eq!(runner.coordinator().offset(IntersectionId(2)), Some(secs(30)));
    }

    #[test]
    fn every_network_problem_is_reported() {
        let json = format!(
            r#"{{
                "network": {{ "update_interval_s": 0 }},
                "intersections": {{ "1": {a}, "2": {b} }},
                "connections": [ {{ "from": 1, "to": 2, "distance_m": -1 }} ],
                "corridors": [ {{ "name": "main", "intersections": [1, 9], "priority": "urgent" }} ]
            }}"#,
            a = small_body("a").replace(r#""name": "a""#, r#""id": 5, "name": "a""#),
            b = small_body("b"),
        );
        let Err(ConfigError::Invalid(problems)) = parse_network(&json) else {
            panic!("expected Invalid");
        };
        // id mismatch, distance, priority, unknown member, missing link,
        // update interval
        assert_eq!(problems.len(), 6, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("declares id 5")));
        assert!(problems.iter().any(|p| p.contains("urgent")));
    }

    #[test]
    fn empty_network_rejected() {
        let json = r#"{ "intersections": {} }"#;
        assert!(matches!(parse_network(json), Err(ConfigError::Invalid(_))));
    }
}

// ── Replay ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod replay {
    use std::io::{Cursor, Write};

    use tsc_core::{Tick, VehicleClass};
    use tsc_phase::IntersectionLayout;

    use crate::{ConfigError, load_replay_csv, load_replay_reader, parse_intersection};

    use super::helpers::INTERSECTION;

    const HEADER: &str =
        "tick,lane,vehicle_count,car,truck,bus,motorcycle,bicycle,pedestrians,emergency,positions\n";

    fn layout() -> IntersectionLayout {
        parse_intersection(INTERSECTION).unwrap().layout
    }

    fn load(rows: &str) -> Result<crate::ReplayFeed, ConfigError> {
        load_replay_reader(Cursor::new(format!("{HEADER}{rows}")), &layout())
    }

    #[test]
    fn frames_grouped_by_tick() {
        let feed = load(
            "0,north_1,3,2,1,,,,0,,4.5;11.0;17.2\n\
             0,east_1,1,1,0,0,0,0,0,,\n\
             1,north_1,2,2,0,0,0,0,0,ambulance,4.5\n\
             1,ew_crossing,0,,,,,,4,,\n",
        )
        .unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.last_tick(), Some(Tick(1)));

        let layout = layout();
        let north = layout.lane_by_name("north_1").unwrap().id;
        let f0 = feed.frame_at(Tick(0)).unwrap();
        assert_eq!(f0.lanes.len(), 2);
        let obs = f0.get(north).unwrap();
        assert_eq!(obs.vehicle_count, 3);
        assert_eq!(obs.vehicle_types.count(VehicleClass::Truck), 1);
        assert_eq!(obs.positions, vec![4.5, 11.0, 17.2]);

        let f1 = feed.frame_at(Tick(1)).unwrap();
        assert_eq!(f1.get(north).unwrap().emergency, Some(VehicleClass::Ambulance));
        let crossing = layout.lane_by_name("ew_crossing").unwrap().id;
        assert_eq!(f1.get(crossing).unwrap().pedestrian_count, 4);
        assert!(feed.frame_at(Tick(2)).is_none());
    }

    #[test]
    fn unknown_lane_names_row() {
        let err = load("0,north_1,1,,,,,,,,\n0,upstairs,1,,,,,,,,\n").unwrap_err();
        assert!(matches!(err, ConfigError::Replay { row: 3, .. }), "{err}");
    }

    #[test]
    fn bad_values_rejected() {
        assert!(matches!(load("0,north_1,1,,,,,,,,4.5;x\n"), Err(ConfigError::Replay { .. })));
        assert!(matches!(load("0,north_1,1,,,,,,,,-3\n"), Err(ConfigError::Replay { .. })));
        assert!(matches!(load("0,north_1,1,,,,,,,car,\n"), Err(ConfigError::Replay { .. })));
        assert!(matches!(load("0,north_1,1,,,,,,,,\n0,north_1,2,,,,,,,,\n"), Err(ConfigError::Replay { .. })));
        assert!(matches!(load("zero,north_1,1,,,,,,,,\n"), Err(ConfigError::Csv(_))));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("replay.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{HEADER}5,west_1,4,4,0,0,0,0,0,,\n").unwrap();
        drop(f);

        let feed = load_replay_csv(&path, &layout()).unwrap();
        assert_eq!(feed.frames().count(), 1);
        assert_eq!(feed.frame_at(Tick(5)).unwrap().lanes[0].vehicle_count, 4);
    }
}
