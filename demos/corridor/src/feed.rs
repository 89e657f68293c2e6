//! Seeded synthetic detection feed and eastbound probe vehicles.
//!
//! Each lane keeps a queue.  Vehicles arrive with a per-lane probability
//! every tick and leave at saturation flow (one per two seconds) while the
//! lane's movement shows GREEN.  The queue is published every tick as an
//! `ObservationFrame` into the controller's observation slot.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use tsc_control::SignalController;
use tsc_core::{
    IntersectionId, LaneId, LaneObservation, MovementId, ObservationFrame, SignalState,
    VehicleClass, VehicleMix,
};
use tsc_network::NetworkRunner;
use tsc_phase::LaneRole;

/// Gap between queued vehicles (m).
const SPACING_M: f32 = 7.0;

struct LaneFeed {
    lane:        LaneId,
    movement:    MovementId,
    /// Arrival probability per second.
    rate:        f64,
    crosswalk:   bool,
    queue:       u32,
    /// Seconds since the last discharge.
    since_leave: u32,
}

struct NodeFeed {
    id:        IntersectionId,
    lanes:     Vec<LaneFeed>,
    /// Active injected emergency: lane, class, remaining ticks.
    emergency: Option<(LaneId, VehicleClass, u32)>,
}

pub struct SyntheticFeed {
    rng:   SmallRng,
    nodes: Vec<NodeFeed>,
}

fn arrival_rate(lane_name: &str) -> f64 {
    match lane_name.split('_').next() {
        Some("east") => 0.30,
        Some("west") => 0.15,
        Some("north") | Some("south") => 0.10,
        _ => 0.05,
    }
}

impl SyntheticFeed {
    pub fn new(runner: &NetworkRunner, seed: u64) -> Self {
        let nodes = runner
            .controllers()
            .iter()
            .map(|c| NodeFeed {
                id:        c.id(),
                lanes:     c
                    .layout()
                    .lanes
                    .iter()
                    .map(|l| LaneFeed {
                        lane:        l.id,
                        movement:    l.movement,
                        rate:        arrival_rate(&l.name),
                        crosswalk:   l.role == LaneRole::Crosswalk,
                        queue:       0,
                        since_leave: 0,
                    })
                    .collect(),
                emergency: None,
            })
            .collect();
        Self { rng: SmallRng::seed_from_u64(seed), nodes }
    }

    /// Hold an emergency vehicle in `lane` of `id` for `ticks` ticks.
    pub fn inject_emergency(&mut self, id: IntersectionId, lane: LaneId, class: VehicleClass, ticks: u32) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.emergency = Some((lane, class, ticks));
        }
    }

    /// Advance every queue by one second and publish a fresh frame to each
    /// online controller.
    pub fn tick(&mut self, runner: &NetworkRunner) {
        for node in &mut self.nodes {
            let Some(controller) = runner.controller(node.id) else {
                continue;
            };
            let mut frame = ObservationFrame::new(controller.clock.current_tick);
            for lane in &mut node.lanes {
                advance_lane(&mut self.rng, lane, controller);
                frame.push(observe(&mut self.rng, lane, node.emergency));
            }
            if let Some((_, _, left)) = node.emergency.as_mut() {
                *left = left.saturating_sub(1);
            }
            if node.emergency.is_some_and(|(_, _, left)| left == 0) {
                node.emergency = None;
            }
            controller.publish(frame);
        }
    }
}

fn advance_lane(rng: &mut SmallRng, lane: &mut LaneFeed, controller: &SignalController) {
    if rng.gen_bool(lane.rate) {
        lane.queue += 1;
    }
    lane.since_leave += 1;
    let green = controller.state_of(lane.movement) == SignalState::Green;
    if green && lane.queue > 0 && lane.since_leave >= 2 {
        lane.queue -= if lane.crosswalk { lane.queue } else { 1 };
        lane.since_leave = 0;
    }
}

fn observe(rng: &mut SmallRng, lane: &LaneFeed, emergency: Option<(LaneId, VehicleClass, u32)>) -> LaneObservation {
    if lane.crosswalk {
        return LaneObservation::new(lane.lane, 0).with_pedestrians(lane.queue);
    }
    let buses = (0..lane.queue).filter(|_| rng.gen_bool(0.05)).count() as u32;
    let trucks = (0..lane.queue - buses).filter(|_| rng.gen_bool(0.10)).count() as u32;
    let mix = VehicleMix::new()
        .with(VehicleClass::Car, lane.queue - buses - trucks)
        .with(VehicleClass::Bus, buses)
        .with(VehicleClass::Truck, trucks);
    let positions = (0..lane.queue).map(|i| 2.0 + i as f32 * SPACING_M).collect();
    let mut obs = LaneObservation::new(lane.lane, lane.queue)
        .with_types(mix)
        .with_positions(positions);
    if let Some((_, class, _)) = emergency.filter(|(l, _, _)| *l == lane.lane) {
        obs = obs.with_emergency(class);
    }
    obs
}

// ── Probe vehicles ────────────────────────────────────────────────────────────

struct Probe {
    started:  Duration,
    /// Index into the route of the next stop line.
    next:     usize,
    arrive:   Duration,
    stops:    u32,
    stopped:  bool,
}

/// Eastbound probes along a fixed route; each reports its trip to the
/// coordinator when it clears the last intersection.
pub struct Probes {
    /// (intersection, eastbound movement, travel time to the next member).
    route:  Vec<(IntersectionId, MovementId, Duration)>,
    active: Vec<Probe>,
    pub completed: u64,
}

impl Probes {
    pub fn new(route: Vec<(IntersectionId, MovementId, Duration)>) -> Self {
        Self { route, active: Vec::new(), completed: 0 }
    }

    pub fn launch(&mut self, now: Duration) {
        self.active.push(Probe { started: now, next: 0, arrive: now, stops: 0, stopped: false });
    }

    pub fn tick(&mut self, runner: &mut NetworkRunner, now: Duration) {
        let mut finished = Vec::new();
        for (i, p) in self.active.iter_mut().enumerate() {
            if p.arrive > now {
                continue;
            }
            let Some(&(id, movement, travel)) = self.route.get(p.next) else {
                continue;
            };
            let green = runner
                .controller(id)
                .is_some_and(|c| c.state_of(movement) == SignalState::Green);
            if !green {
                if !p.stopped {
                    p.stops += 1;
                    p.stopped = true;
                }
                continue;
            }
            p.stopped = false;
            p.next += 1;
            p.arrive = now + travel;
            if p.next == self.route.len() {
                finished.push(i);
            }
        }
        for i in finished.into_iter().rev() {
            let p = self.active.swap_remove(i);
            runner.coordinator_mut().record_trip(now - p.started, p.stops);
            self.completed += 1;
        }
    }
}
