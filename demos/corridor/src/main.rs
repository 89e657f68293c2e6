//! corridor: three coordinated intersections on an eastbound arterial.
//!
//! Runs half an hour of morning peak against a seeded synthetic detection
//! feed.  Along the way an ambulance preempts the middle intersection, an
//! operator overrides the east end, the green pool is retuned, and the west
//! end drops off line for a minute so the coordinator has to route around it.
//!
//! ```text
//! RUST_LOG=corridor=info,tsc_control=debug cargo run -p corridor
//! ```

mod feed;

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tsc_control::{CommandOutcome, ControllerObserver, Transition};
use tsc_core::{ControlClock, IntersectionId, MovementId, VehicleClass};
use tsc_emergency::ArbiterTransition;
use tsc_network::NetworkRunner;
use tsc_phase::SignalPlan;

use feed::{Probes, SyntheticFeed};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:           u64 = 42;
const SIM_TICKS:      u64 = 1_800;
const START_OF_DAY:   u32 = 7 * 3_600 + 30 * 60; // 07:30
const PROBE_EVERY_S:  u64 = 45;

const EMERGENCY_AT_S: u64 = 600;
const OVERRIDE_AT_S:  u64 = 900;
const RETUNE_AT_S:    u64 = 1_200;
const OFFLINE_AT_S:   u64 = 1_350;
const ONLINE_AT_S:    u64 = 1_410;

const WEST:   IntersectionId = IntersectionId(1);
const MIDDLE: IntersectionId = IntersectionId(2);
const EAST:   IntersectionId = IntersectionId(3);

const DEFAULT_FILTER: &str = "corridor=info,tsc_control=info,tsc_network=info";

// ── Network definition ────────────────────────────────────────────────────────

fn intersection(name: &str) -> serde_json::Value {
    json!({
        "intersection": { "name": name },
        "lanes": {
            "north_1": { "direction": "north" },
            "south_1": { "direction": "south" },
            "east_1":  { "direction": "east", "capacity_m": 120 },
            "east_2":  { "direction": "east", "capacity_m": 120 },
            "west_1":  { "direction": "west", "capacity_m": 120 }
        },
        "turn_lanes": {
            "east_left": { "turn": "left", "parent": "east", "conflicts": ["west", "north", "south"] }
        },
        "crosswalks": {
            "ns_crossing": { "crossing_distance_m": 16.0, "conflicts": ["east", "west", "east_left"] }
        },
        "conflicts": [["north", "east"], ["north", "west"], ["south", "east"], ["south", "west"]],
        "signal_timing": { "green_pool_s": 70 },
        "emergency": { "tie_break": "vehicle_class" }
    })
}

fn network_json() -> serde_json::Value {
    json!({
        "network": { "name": "Government St", "update_interval_s": 5 },
        "intersections": {
            "1": intersection("Government & Broad"),
            "2": intersection("Government & Royal"),
            "3": intersection("Government & Water")
        },
        "connections": [
            { "from": 1, "to": 2, "distance_m": 420, "travel_time_s": 30, "bidirectional": true },
            { "from": 2, "to": 3, "distance_m": 350, "bidirectional": true }
        ],
        "corridors": [
            { "name": "eastbound", "intersections": [1, 2, 3], "direction": "eastbound", "priority": "high" },
            { "name": "westbound", "intersections": [3, 2, 1], "direction": "westbound", "priority": "low" }
        ]
    })
}

/// (intersection, eastbound movement, travel time to the next member).
fn eastbound_route(runner: &NetworkRunner) -> Result<Vec<(IntersectionId, MovementId, Duration)>> {
    let topology = runner.coordinator().topology();
    let speed = runner.coordinator().config().target_speed_mps;
    let ids = [WEST, MIDDLE, EAST];
    ids.iter()
        .enumerate()
        .map(|(i, &id)| {
            let controller = runner.controller(id).ok_or_else(|| anyhow!("no controller for {id}"))?;
            let east = controller
                .layout()
                .movement_by_name("east")
                .ok_or_else(|| anyhow!("{id} has no east movement"))?
                .id;
            let travel = ids
                .get(i + 1)
                .and_then(|&next| topology.link_between(id, next))
                .map(|l| topology.travel_time(l, speed))
                .unwrap_or_default();
            Ok((id, east, travel))
        })
        .collect()
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    transitions: usize,
    plans:       usize,
    emergencies: usize,
    commands:    usize,
    faults:      usize,
}

impl ControllerObserver for Tally {
    fn on_transition(&mut self, _id: IntersectionId, _t: &Transition) {
        self.transitions += 1;
    }

    fn on_plan(&mut self, _id: IntersectionId, _plan: &SignalPlan) {
        self.plans += 1;
    }

    fn on_emergency(&mut self, id: IntersectionId, t: &ArbiterTransition) {
        self.emergencies += 1;
        match t {
            ArbiterTransition::Activated(e) => info!(%id, vehicle = %e.vehicle, lane = %e.lane, "preemption started"),
            ArbiterTransition::Cleared { event, reason } => {
                info!(%id, vehicle = %event.vehicle, ?reason, "preemption ended")
            }
        }
    }

    fn on_command(&mut self, id: IntersectionId, outcome: &CommandOutcome) {
        self.commands += 1;
        info!(%id, ticket = %outcome.ticket, applied = outcome.applied, detail = %outcome.detail, "command finished");
    }

    fn on_safety_fault(&mut self, _id: IntersectionId, _a: MovementId, _b: MovementId) {
        self.faults += 1;
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .init();

    println!("=== corridor: adaptive signals with green-wave coordination ===");
    println!("Ticks: {SIM_TICKS}  |  Seed: {SEED}");
    println!();

    // 1. Resolve the network definition.
    let file: tsc_config::NetworkFile =
        serde_json::from_value(network_json()).context("network definition")?;
    let setup = tsc_config::resolve_network(&file)?;
    println!(
        "Network {:?}: {} intersections, {} links, {} corridors",
        setup.name,
        setup.intersections.len(),
        setup.topology.link_count(),
        setup.topology.corridors.len()
    );

    // 2. Controllers + coordinator on one clock.
    let clock = ControlClock::new(Duration::from_secs(1), START_OF_DAY);
    let mut runner = setup.into_runner(clock)?;
    let route = eastbound_route(&runner)?;

    let mut feed = SyntheticFeed::new(&runner, SEED);
    let mut probes = Probes::new(route);
    let mut tally = Tally::default();

    // 3. Run.
    let t0 = Instant::now();
    for _ in 0..SIM_TICKS {
        let now = runner.clock.elapsed();
        match now.as_secs() {
            EMERGENCY_AT_S => {
                let lane = lane_id(&runner, MIDDLE, "north_1")?;
                feed.inject_emergency(MIDDLE, lane, VehicleClass::Ambulance, 25);
            }
            OVERRIDE_AT_S => {
                let lane = lane_id(&runner, EAST, "north_1")?;
                let controller = runner.controller(EAST).ok_or_else(|| anyhow!("no controller for {EAST}"))?;
                let reply = controller.handle().override_green(lane, Duration::from_secs(20));
                info!(accepted = reply.accepted, reason = %reply.reason, "operator override submitted");
            }
            RETUNE_AT_S => {
                let controller = runner.controller(WEST).ok_or_else(|| anyhow!("no controller for {WEST}"))?;
                let reply = controller.handle().adjust_parameter("green_pool", 80.0);
                info!(accepted = reply.accepted, "green pool retune submitted");
            }
            OFFLINE_AT_S => runner.set_online(WEST, false)?,
            ONLINE_AT_S => runner.set_online(WEST, true)?,
            _ => {}
        }
        if now.as_secs() % PROBE_EVERY_S == 0 {
            probes.launch(now);
        }

        feed.tick(&runner);
        for report in runner.step().reports {
            report.deliver(&mut tally);
        }
        let now = runner.clock.elapsed();
        probes.tick(&mut runner, now);
    }
    let elapsed = t0.elapsed();

    // 4. Summary.
    println!("Run complete in {:.3} s", elapsed.as_secs_f64());
    println!(
        "  transitions {}  |  plans {}  |  emergency events {}  |  commands {}  |  faults {}",
        tally.transitions, tally.plans, tally.emergencies, tally.commands, tally.faults
    );
    println!();

    println!("{:<22} {:>6} {:>9} {:>11} {:>8}", "Intersection", "Cycles", "Cycle(s)", "Discharged", "Offset");
    println!("{}", "-".repeat(60));
    for c in runner.controllers() {
        let offset = runner
            .coordinator()
            .offset(c.id())
            .map(|o| format!("{:.0}", o.as_secs_f32()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:>6} {:>9.0} {:>11} {:>8}",
            c.layout().name,
            c.cycle(),
            c.cycle_time().as_secs_f32(),
            c.discharged(),
            offset
        );
    }
    println!();
    println!("Probe trips completed: {}", probes.completed);

    let metrics = runner.coordinator().metrics();
    println!("Network metrics:\n{}", serde_json::to_string_pretty(&metrics)?);

    let middle = runner.controller(MIDDLE).ok_or_else(|| anyhow!("no controller for {MIDDLE}"))?;
    println!("Snapshot of {}:\n{}", middle.layout().name, serde_json::to_string_pretty(&middle.snapshot())?);

    Ok(())
}

fn lane_id(runner: &NetworkRunner, id: IntersectionId, name: &str) -> Result<tsc_core::LaneId> {
    runner
        .controller(id)
        .and_then(|c| c.layout().lane_by_name(name))
        .map(|l| l.id)
        .ok_or_else(|| anyhow!("{id} has no lane {name:?}"))
}
