//! Turn parsed files into validated layouts, controller configs, and
//! network topologies.
//!
//! Resolution never stops at the first problem: every unknown reference and
//! out-of-range value in a file is collected and returned together in
//! [`ConfigError::Invalid`].

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};
use tsc_analysis::WeatherCondition;
use tsc_control::{ControllerBuilder, ControllerConfig, SignalController};
use tsc_core::{ControlClock, IntersectionId, VehicleClass};
use tsc_emergency::{ArbiterConfig, TieBreak};
use tsc_network::{
    CoordinatorConfig, Corridor, CorridorPriority, NetworkCoordinator, NetworkError,
    NetworkRunner, NetworkTopology, TopologyBuilder,
};
use tsc_phase::{IntersectionLayout, LayoutBuilder, TurnKind};

use crate::schema::{IntersectionFile, NetworkFile, NetworkHeader};
use crate::{ConfigError, ConfigResult};

// ── Resolved setups ───────────────────────────────────────────────────────────

/// One intersection, ready to build a controller from.
#[derive(Clone, Debug)]
pub struct IntersectionSetup {
    pub layout: IntersectionLayout,
    pub config: ControllerConfig,
}

impl IntersectionSetup {
    pub fn controller(self, clock: ControlClock) -> ConfigResult<SignalController> {
        Ok(ControllerBuilder::new(self.layout).config(self.config).clock(clock).build()?)
    }
}

/// A whole corridor network.
#[derive(Clone, Debug)]
pub struct NetworkSetup {
    pub name:          String,
    /// In intersection-id order.
    pub intersections: Vec<IntersectionSetup>,
    pub topology:      NetworkTopology,
    pub coordinator:   CoordinatorConfig,
}

impl NetworkSetup {
    /// Build every controller on a shared clock and register it with a new
    /// coordinator.
    pub fn into_runner(self, clock: ControlClock) -> ConfigResult<NetworkRunner> {
        let coordinator = NetworkCoordinator::new(self.topology, self.coordinator)?;
        let mut runner = NetworkRunner::new(coordinator, clock);
        for setup in self.intersections {
            runner.add(setup.controller(clock)?)?;
        }
        info!(network = %self.name, members = runner.len(), "network runner assembled");
        Ok(runner)
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

pub fn load_intersection(path: &Path) -> ConfigResult<IntersectionSetup> {
    let text = std::fs::read_to_string(path)?;
    parse_intersection(&text)
}

pub fn parse_intersection(json: &str) -> ConfigResult<IntersectionSetup> {
    let file: IntersectionFile = serde_json::from_str(json)?;
    resolve_intersection(&file)
}

pub fn resolve_intersection(file: &IntersectionFile) -> ConfigResult<IntersectionSetup> {
    let mut problems = Vec::new();
    let id = file.intersection.id;
    if id.is_none() {
        problems.push("intersection.id is required".to_string());
    }
    let setup = resolve_body(file, IntersectionId(id.unwrap_or(0)), "", &mut problems);
    match setup {
        Some(s) if problems.is_empty() => Ok(s),
        _ => Err(ConfigError::Invalid(problems)),
    }
}

pub fn load_network(path: &Path) -> ConfigResult<NetworkSetup> {
    let text = std::fs::read_to_string(path)?;
    parse_network(&text)
}

pub fn parse_network(json: &str) -> ConfigResult<NetworkSetup> {
    let file: NetworkFile = serde_json::from_str(json)?;
    resolve_network(&file)
}

pub fn resolve_network(file: &NetworkFile) -> ConfigResult<NetworkSetup> {
    let mut problems = Vec::new();

    if file.intersections.is_empty() {
        problems.push("network has no intersections".to_string());
    }
    let mut intersections = Vec::with_capacity(file.intersections.len());
    for (&id, body) in &file.intersections {
        let prefix = format!("intersection {id}: ");
        if let Some(declared) = body.intersection.id.filter(|&d| d != id) {
            problems.push(format!("{prefix}declares id {declared} under key {id}"));
        }
        if let Some(setup) = resolve_body(body, IntersectionId(id), &prefix, &mut problems) {
            intersections.push(setup);
        }
    }

    let mut b = TopologyBuilder::new();
    for &id in file.intersections.keys() {
        b.add_intersection(IntersectionId(id));
    }
    for (i, c) in file.connections.iter().enumerate() {
        let label = format!("connection {i} ({} -> {})", c.from, c.to);
        let travel = match c.travel_time_s {
            Some(t) => seconds(&mut problems, &format!("{label} travel_time_s"), t),
            None => None,
        };
        let (from, to) = (IntersectionId(c.from), IntersectionId(c.to));
        if c.bidirectional {
            b.connect_both(from, to, c.distance_m, travel);
        } else {
            b.connect(from, to, c.distance_m, travel);
        }
    }
    for c in &file.corridors {
        let priority = match c.priority.as_deref() {
            None => CorridorPriority::default(),
            Some(p) => p.parse().unwrap_or_else(|e| {
                problems.push(format!("corridor {:?}: {e}", c.name));
                CorridorPriority::default()
            }),
        };
        let members = c.intersections.iter().map(|&id| IntersectionId(id)).collect();
        b.corridor(
            Corridor::new(c.name.clone(), members)
                .with_direction(c.direction.clone())
                .with_priority(priority),
        );
    }
    let topology = match b.build() {
        Ok(t) => Some(t),
        Err(NetworkError::InvalidTopology(list)) => {
            problems.extend(list);
            None
        }
        Err(e) => {
            problems.push(e.to_string());
            None
        }
    };

    let coordinator = coordinator_config(&file.network, &mut problems);
    if let Err(e) = coordinator.validate() {
        problems.push(e.to_string());
    }

    match topology {
        Some(topology) if problems.is_empty() => {
            debug!(
                network = %file.network.name,
                intersections = intersections.len(),
                links = topology.link_count(),
                corridors = topology.corridors.len(),
                "network configuration resolved"
            );
            Ok(NetworkSetup {
                name: file.network.name.clone(),
                intersections,
                topology,
                coordinator,
            })
        }
        _ => Err(ConfigError::Invalid(problems)),
    }
}

// ── Intersection body ─────────────────────────────────────────────────────────

fn resolve_body(
    file: &IntersectionFile,
    id: IntersectionId,
    prefix: &str,
    problems: &mut Vec<String>,
) -> Option<IntersectionSetup> {
    let before = problems.len();
    let layout = resolve_layout(file, id, prefix, problems);
    let config = resolve_config(file, prefix, problems);
    match layout {
        Some(layout) if problems.len() == before => Some(IntersectionSetup { layout, config }),
        _ => None,
    }
}

fn resolve_layout(
    file: &IntersectionFile,
    id: IntersectionId,
    prefix: &str,
    problems: &mut Vec<String>,
) -> Option<IntersectionLayout> {
    let before = problems.len();
    let name = if file.intersection.name.is_empty() {
        format!("intersection-{}", id.0)
    } else {
        file.intersection.name.clone()
    };
    let mut b = LayoutBuilder::new(id, name);

    if file.lanes.is_empty() {
        problems.push(format!("{prefix}no lanes defined"));
    }
    for (lane, entry) in &file.lanes {
        let movement = entry.movement.as_deref().unwrap_or(&entry.direction).trim();
        if movement.is_empty() {
            problems.push(format!("{prefix}lane {lane:?} names no direction or movement"));
            continue;
        }
        if !(entry.capacity_m.is_finite() && entry.capacity_m >= 0.0) {
            problems.push(format!("{prefix}lane {lane:?} capacity_m must be non-negative"));
        }
        let m = match b.movement_id(movement) {
            Some(m) => m,
            None => b.through(movement),
        };
        b.lane(lane.clone(), m, entry.capacity_m);
    }

    let mut pending: Vec<(String, &[String])> = Vec::new();
    for (lane, entry) in &file.turn_lanes {
        let Some(turn) = parse_turn(&entry.turn) else {
            problems.push(format!("{prefix}turn lane {lane:?} has unknown turn {:?}", entry.turn));
            continue;
        };
        let Some(parent) = b.movement_id(&entry.parent) else {
            problems.push(format!(
                "{prefix}turn lane {lane:?} references unknown movement {:?}",
                entry.parent
            ));
            continue;
        };
        if !(entry.capacity_m.is_finite() && entry.capacity_m >= 0.0) {
            problems.push(format!("{prefix}turn lane {lane:?} capacity_m must be non-negative"));
        }
        let m = b.turn(lane.clone(), turn, parent);
        b.lane(lane.clone(), m, entry.capacity_m);
        pending.push((lane.clone(), entry.conflicts.as_slice()));
    }

    for (name, entry) in &file.crosswalks {
        if !(entry.crossing_distance_m.is_finite() && entry.crossing_distance_m > 0.0) {
            problems.push(format!("{prefix}crosswalk {name:?} crossing_distance_m must be positive"));
            continue;
        }
        b.crosswalk(name.clone(), entry.crossing_distance_m);
        pending.push((name.clone(), entry.conflicts.as_slice()));
    }

    let pairs = file
        .conflicts
        .iter()
        .map(|[a, c]| (a.clone(), c.clone()))
        .chain(pending.iter().flat_map(|(a, list)| list.iter().map(move |c| (a.clone(), c.clone()))));
    for (a, c) in pairs {
        match (b.movement_id(&a), b.movement_id(&c)) {
            (Some(ma), Some(mc)) => {
                b.conflict(ma, mc);
            }
            (ma, mc) => {
                for (name, found) in [(&a, ma), (&c, mc)] {
                    if found.is_none() {
                        problems.push(format!("{prefix}conflict references unknown movement {name:?}"));
                    }
                }
            }
        }
    }

    if problems.len() > before {
        return None;
    }
    match b.build() {
        Ok(layout) => Some(layout),
        Err(e) => {
            problems.push(format!("{prefix}{e}"));
            None
        }
    }
}

fn resolve_config(file: &IntersectionFile, prefix: &str, problems: &mut Vec<String>) -> ControllerConfig {
    let d = ControllerConfig::default();
    let t = &file.signal_timing;
    let th = &file.thresholds;
    let mut secs = |label: &str, value: f64, fallback: Duration| {
        seconds(problems, &format!("{prefix}{label}"), value).unwrap_or(fallback)
    };

    let minimum_green = secs("signal_timing.minimum_green_s", t.minimum_green_s, d.minimum_green);
    let maximum_green = secs("signal_timing.maximum_green_s", t.maximum_green_s, d.maximum_green);
    let yellow = secs("signal_timing.yellow_s", t.yellow_s, d.yellow);
    let all_red = secs("signal_timing.all_red_s", t.all_red_s, d.all_red);
    let green_pool = secs("signal_timing.green_pool_s", t.green_pool_s, d.green_pool);
    let minimum_crossing = secs("signal_timing.minimum_crossing_s", t.minimum_crossing_s, d.minimum_crossing);
    let starvation_threshold = secs("thresholds.starvation_s", th.starvation_s, d.starvation_threshold);
    let fairness_threshold = secs("thresholds.fairness_s", th.fairness_s, d.fairness_threshold);
    let debounce = secs("emergency.debounce_s", file.emergency.debounce_s, d.emergency.debounce);
    let max_hold = secs("emergency.max_hold_s", file.emergency.max_hold_s, d.emergency.max_hold);

    let tie_break = file.emergency.tie_break.parse::<TieBreak>().unwrap_or_else(|e| {
        problems.push(format!("{prefix}emergency.tie_break: {e}"));
        TieBreak::default()
    });

    let mut weights = d.weights.clone();
    for (class, &w) in &file.vehicle_weights {
        match class.parse::<VehicleClass>() {
            Ok(c) if w.is_finite() && w >= 0.0 => weights.set(c, w),
            Ok(_) => problems.push(format!("{prefix}vehicle weight for {class} must be non-negative")),
            Err(e) => problems.push(format!("{prefix}vehicle_weights: {e}")),
        }
    }

    let weather = match file.weather.as_deref() {
        None => WeatherCondition::default(),
        Some(w) => parse_weather(w).unwrap_or_else(|| {
            problems.push(format!("{prefix}unknown weather {w:?}"));
            WeatherCondition::default()
        }),
    };

    let config = ControllerConfig {
        minimum_green,
        maximum_green,
        yellow,
        all_red,
        green_pool,
        turn_activation: th.turn_activation,
        pedestrian_activation: th.pedestrian_activation,
        walking_speed_mps: t.walking_speed_mps,
        minimum_crossing,
        starvation_threshold,
        fairness_threshold,
        spacing_threshold_m: th.spacing_m,
        emergency: ArbiterConfig { debounce, max_hold, tie_break },
        weights,
        weather,
        ..d
    };
    problems.extend(config.problems().into_iter().map(|p| format!("{prefix}{p}")));
    config
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn coordinator_config(h: &NetworkHeader, problems: &mut Vec<String>) -> CoordinatorConfig {
    let d = CoordinatorConfig::default();
    let mut secs = |label: &str, value: f64, fallback: Duration| {
        seconds(problems, &format!("network.{label}"), value).unwrap_or(fallback)
    };
    CoordinatorConfig {
        enabled:          h.coordination_enabled,
        target_speed_mps: h.target_speed_mps,
        update_interval:  secs("update_interval_s", h.update_interval_s, d.update_interval),
        cycle_tolerance:  secs("cycle_tolerance_s", h.cycle_tolerance_s, d.cycle_tolerance),
        min_reoptimize:   secs("min_reoptimize_s", h.min_reoptimize_s, d.min_reoptimize),
        stale_after:      secs("stale_after_s", h.stale_after_s, d.stale_after),
    }
}

/// Seconds to a `Duration`; `None` (plus a problem) when negative or not finite.
fn seconds(problems: &mut Vec<String>, label: &str, value: f64) -> Option<Duration> {
    if value.is_finite() && value >= 0.0 {
        Some(Duration::from_secs_f64(value))
    } else {
        problems.push(format!("{label} must be a non-negative number of seconds, got {value}"));
        None
    }
}

fn parse_turn(s: &str) -> Option<TurnKind> {
    match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "left" => Some(TurnKind::Left),
        "right" => Some(TurnKind::Right),
        "u_turn" | "uturn" => Some(TurnKind::UTurn),
        _ => None,
    }
}

fn parse_weather(s: &str) -> Option<WeatherCondition> {
    match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "clear" => Some(WeatherCondition::Clear),
        "rain" => Some(WeatherCondition::Rain),
        "snow" => Some(WeatherCondition::Snow),
        "fog" => Some(WeatherCondition::Fog),
        "heavy_rain" => Some(WeatherCondition::HeavyRain),
        "heavy_snow" => Some(WeatherCondition::HeavySnow),
        _ => None,
    }
}
