//! On-disk JSON schema.
//!
//! Every section except `intersection` and `lanes` is optional and falls back
//! to the controller defaults.  Durations are given in seconds.
//!
//! ```json
//! {
//!   "intersection": { "id": 1, "name": "Main & 1st" },
//!   "lanes": {
//!     "north_1": { "direction": "north", "capacity_m": 80 },
//!     "north_2": { "direction": "north" },
//!     "east_1":  { "direction": "east", "movement": "east_through" }
//!   },
//!   "turn_lanes": {
//!     "north_left": { "turn": "left", "parent": "north", "conflicts": ["south", "east_through"] }
//!   },
//!   "crosswalks": {
//!     "north_crossing": { "crossing_distance_m": 14.4, "conflicts": ["east_through"] }
//!   },
//!   "conflicts": [["north", "east_through"]],
//!   "signal_timing": { "minimum_green_s": 10, "yellow_s": 3 },
//!   "thresholds": { "turn_activation": 3 },
//!   "emergency": { "tie_break": "vehicle_class" },
//!   "vehicle_weights": { "bus": 2.5 }
//! }
//! ```
//!
//! Lanes feed the through movement named by `movement`, or by `direction`
//! when `movement` is absent.  Lane ids are assigned in lane-name order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Intersection file ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntersectionFile {
    #[serde(default)]
    pub intersection:    IntersectionHeader,
    pub lanes:           BTreeMap<String, LaneSpec>,
    #[serde(default)]
    pub turn_lanes:      BTreeMap<String, TurnLaneSpec>,
    #[serde(default)]
    pub crosswalks:      BTreeMap<String, CrosswalkSpec>,
    /// Pairs of movement names that may never be non-RED together.
    #[serde(default)]
    pub conflicts:       Vec<[String; 2]>,
    #[serde(default)]
    pub signal_timing:   SignalTiming,
    #[serde(default)]
    pub thresholds:      Thresholds,
    #[serde(default)]
    pub emergency:       EmergencySpec,
    /// Vehicle class name to weight; unlisted classes keep their default.
    #[serde(default)]
    pub vehicle_weights: BTreeMap<String, f32>,
    /// `clear`, `rain`, `snow`, `fog`, `heavy_rain` or `heavy_snow`.
    #[serde(default)]
    pub weather:         Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntersectionHeader {
    /// Required in a standalone file; inside a network file the map key
    /// supplies it.
    #[serde(default)]
    pub id:   Option<u32>,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneSpec {
    pub direction:  String,
    #[serde(default = "default_capacity_m")]
    pub capacity_m: f32,
    #[serde(default)]
    pub movement:   Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnLaneSpec {
    /// `left`, `right` or `u_turn`.
    pub turn:       String,
    /// Through movement the turn is served with when not protected.
    pub parent:     String,
    #[serde(default)]
    pub conflicts:  Vec<String>,
    #[serde(default = "default_turn_capacity_m")]
    pub capacity_m: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkSpec {
    pub crossing_distance_m: f32,
    #[serde(default)]
    pub conflicts:           Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalTiming {
    pub minimum_green_s:    f64,
    pub maximum_green_s:    f64,
    pub yellow_s:           f64,
    pub all_red_s:          f64,
    pub green_pool_s:       f64,
    pub walking_speed_mps:  f32,
    pub minimum_crossing_s: f64,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            minimum_green_s:    10.0,
            maximum_green_s:    60.0,
            yellow_s:           3.0,
            all_red_s:          2.0,
            green_pool_s:       60.0,
            walking_speed_mps:  1.2,
            minimum_crossing_s: 7.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub turn_activation:       u32,
    pub pedestrian_activation: u32,
    pub starvation_s:          f64,
    pub fairness_s:            f64,
    pub spacing_m:             f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            turn_activation:       3,
            pedestrian_activation: 1,
            starvation_s:          180.0,
            fairness_s:            120.0,
            spacing_m:             10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencySpec {
    pub debounce_s: f64,
    pub max_hold_s: f64,
    /// `detection_order`, `vehicle_class` or `proximity`.
    pub tie_break:  String,
}

impl Default for EmergencySpec {
    fn default() -> Self {
        Self {
            debounce_s: 5.0,
            max_hold_s: 120.0,
            tie_break:  "detection_order".to_string(),
        }
    }
}

fn default_capacity_m() -> f32 {
    60.0
}

fn default_turn_capacity_m() -> f32 {
    30.0
}

// ── Network file ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFile {
    #[serde(default)]
    pub network:       NetworkHeader,
    /// Keyed by intersection id.
    pub intersections: BTreeMap<u32, IntersectionFile>,
    #[serde(default)]
    pub connections:   Vec<ConnectionSpec>,
    #[serde(default)]
    pub corridors:     Vec<CorridorSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkHeader {
    pub name:                 String,
    pub coordination_enabled: bool,
    pub target_speed_mps:     f32,
    pub update_interval_s:    f64,
    pub cycle_tolerance_s:    f64,
    pub min_reoptimize_s:     f64,
    pub stale_after_s:        f64,
}

impl Default for NetworkHeader {
    fn default() -> Self {
        Self {
            name:                 String::new(),
            coordination_enabled: true,
            target_speed_mps:     13.9,
            update_interval_s:    5.0,
            cycle_tolerance_s:    5.0,
            min_reoptimize_s:     30.0,
            stale_after_s:        30.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub from:          u32,
    pub to:            u32,
    pub distance_m:    f32,
    /// Derived from distance and `target_speed_mps` when absent.
    #[serde(default)]
    pub travel_time_s: Option<f64>,
    /// Add the reverse link too.
    #[serde(default)]
    pub bidirectional: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorridorSpec {
    pub name:          String,
    pub intersections: Vec<u32>,
    #[serde(default)]
    pub direction:     String,
    /// `low`, `normal` (or `medium`) or `high`.
    #[serde(default)]
    pub priority:      Option<String>,
}
