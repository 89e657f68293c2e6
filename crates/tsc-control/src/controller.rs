//! The per-intersection signal state machine.
//!
//! # Tick order
//!
//! Each call to [`SignalController::step`] runs, in order:
//!
//! 1. take the newest observation frame, if one was published;
//! 2. accrue per-lane wait and time-since-green;
//! 3. advance the current stage by one tick (GREEN → YELLOW → ALL-RED →
//!    next phase), starting a new cycle when the plan is exhausted;
//! 4. drain the command queue and apply at most one command;
//! 5. feed the emergency arbiter and react to its transitions;
//! 6. check that no two conflicting heads are non-RED.
//!
//! A step that finds conflicting heads forces every head RED, abandons the
//! running plan, and starts a fresh cycle after the clearance interval.
//!
//! # Overrides
//!
//! An override whose movement conflicts with nothing non-RED goes GREEN in
//! the tick it is applied and runs beside the current phase on its own
//! timer.  Phases that conflict with it wait in `SyncHold` until it has
//! cleared.  An override that does conflict cuts the conflicting GREEN short
//! through YELLOW and starts as its own phase at the following boundary.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};
use tsc_analysis::{
    Conditions, LaneData, QueueEstimator, ThroughputTracker, TrafficAnalyzer, TrendTracker,
};
use tsc_core::{
    ControlClock, IntersectionId, LaneId, MovementId, ObservationFrame, SignalState, Tick,
};
use tsc_emergency::{ArbiterTransition, EmergencyArbiter, EmergencyEvent};
use tsc_phase::{
    IntersectionLayout, LaneRole, MovementKind, MovementSet, PedestrianEvaluator, PhaseKind,
    SignalPhase, SignalPlan, TurnEvaluator, WalkSignal,
};

use crate::command::{self, Envelope};
use crate::{
    Command, CommandHandle, CommandOutcome, CommandReply, ControllerConfig, ControllerObserver,
    ControllerSnapshot, EmergencyAction, LaneStatus, MovementStatus, ObservationSlot, OffsetCell,
    SignalHeads, Stage, TickReport, Ticket, Transition, allocation,
};

/// Position inside the running plan.
#[derive(Copy, Clone, Debug)]
struct Cursor {
    index:   usize,
    stage:   Stage,
    elapsed: Duration,
    /// `None` holds the stage until something external ends it.
    length:  Option<Duration>,
}

impl Cursor {
    /// ALL-RED with nothing left to clear; the first step starts a cycle.
    fn initial() -> Self {
        Self { index: 0, stage: Stage::AllRed, elapsed: Duration::ZERO, length: Some(Duration::ZERO) }
    }

    fn enter(index: usize, stage: Stage, length: Option<Duration>) -> Self {
        Self { index, stage, elapsed: Duration::ZERO, length }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct LaneTiming {
    wait:        Duration,
    since_green: Duration,
}

#[derive(Clone, Debug)]
struct QueuedOverride {
    ticket:   Ticket,
    movement: MovementId,
    duration: Duration,
}

/// An override running beside the current phase.
#[derive(Clone, Debug)]
struct SideGreen {
    ticket:   Ticket,
    movement: MovementId,
    /// GREEN, then YELLOW; dropped at RED.
    state:    SignalState,
    left:     Duration,
    served:   Duration,
}

/// Runs one intersection.
///
/// Build with [`ControllerBuilder`][crate::ControllerBuilder].  The
/// controller owns its heads exclusively; sensors publish into its
/// [`ObservationSlot`] and operators talk to it through a
/// [`CommandHandle`].
pub struct SignalController {
    layout:           Arc<IntersectionLayout>,
    config:           ControllerConfig,
    staged:           Arc<RwLock<ControllerConfig>>,
    config_dirty:     bool,

    pub clock:        ControlClock,
    analyzer:         TrafficAnalyzer,
    estimator:        QueueEstimator,
    turns:            TurnEvaluator,
    pedestrians:      PedestrianEvaluator,
    arbiter:          EmergencyArbiter,

    pub(crate) heads: SignalHeads,
    pub(crate) plan:  SignalPlan,
    cursor:           Cursor,
    cycle:            u64,
    last_cycle_time:  Duration,

    slot:             ObservationSlot,
    latest:           Option<ObservationFrame>,
    last_frame_at:    Option<Tick>,
    lane_timing:      Vec<LaneTiming>,
    lane_status:      Vec<LaneStatus>,
    trends:           TrendTracker,
    throughput:       ThroughputTracker,
    discharged:       u64,

    offset:           Arc<OffsetCell>,
    applied_offset:   Option<Duration>,

    preempt:          Option<MovementId>,
    overrides:        VecDeque<QueuedOverride>,
    side:             Option<SideGreen>,
    inbox:            Vec<Envelope>,
    rx:               Receiver<Envelope>,
    handle:           CommandHandle,

    safety_faults:    u64,
    started:          bool,
}

impl SignalController {
    /// Transitions one tick may chain through before the rest waits.
    const MAX_STAGES_PER_TICK: usize = 16;

    pub(crate) fn assemble(
        layout: Arc<IntersectionLayout>,
        config: ControllerConfig,
        clock: ControlClock,
        slot: ObservationSlot,
        offset: Arc<OffsetCell>,
    ) -> Self {
        let staged = Arc::new(RwLock::new(config.clone()));
        let (handle, rx) = command::channel(config.command_capacity, layout.clone(), staged.clone());
        let lanes = layout.lanes.len();
        Self {
            analyzer: config.analyzer(),
            estimator: QueueEstimator::new(config.spacing_threshold_m),
            turns: config.turn_evaluator(),
            pedestrians: config.pedestrian_evaluator(),
            arbiter: EmergencyArbiter::new(config.emergency.clone()),
            heads: SignalHeads::new(layout.movements.len(), config.history_len),
            plan: SignalPlan::new(0),
            cursor: Cursor::initial(),
            cycle: 0,
            last_cycle_time: Duration::ZERO,
            slot,
            latest: None,
            last_frame_at: None,
            lane_timing: vec![LaneTiming::default(); lanes],
            lane_status: Vec::new(),
            trends: TrendTracker::default(),
            throughput: ThroughputTracker::default(),
            discharged: 0,
            offset,
            applied_offset: None,
            preempt: None,
            overrides: VecDeque::new(),
            side: None,
            inbox: Vec::new(),
            rx,
            handle,
            safety_faults: 0,
            started: false,
            layout,
            config,
            staged,
            config_dirty: false,
            clock,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> IntersectionId {
        self.layout.id
    }

    pub fn layout(&self) -> &IntersectionLayout {
        &self.layout
    }

    /// The configuration the running cycle uses.  Staged changes show up
    /// here once the next cycle starts.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// A new sender for this controller's command queue.
    pub fn handle(&self) -> CommandHandle {
        self.handle.clone()
    }

    /// Shorthand for `self.handle().submit(command)`.
    pub fn submit(&self, command: Command) -> CommandReply {
        self.handle.submit(command)
    }

    pub fn observation_slot(&self) -> ObservationSlot {
        self.slot.clone()
    }

    /// Publish a frame for the next step.  Returns `true` when an unread
    /// frame was replaced.
    pub fn publish(&self, frame: ObservationFrame) -> bool {
        self.slot.publish(frame)
    }

    pub fn offset_cell(&self) -> Arc<OffsetCell> {
        self.offset.clone()
    }

    /// Move the local clock to `tick` after a period without stepping.
    ///
    /// The phase in progress resumes where it stopped; the coordinated
    /// offset is re-applied at the next cycle start.
    pub fn resync(&mut self, tick: Tick) {
        let from = self.clock.current_tick;
        self.clock.current_tick = tick;
        self.applied_offset = None;
        info!(intersection = %self.id(), %from, to = %tick, "clock resynchronised");
    }

    pub fn plan(&self) -> &SignalPlan {
        &self.plan
    }

    pub fn stage(&self) -> Stage {
        self.cursor.stage
    }

    pub fn phase_index(&self) -> usize {
        self.cursor.index
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Length of the most recent adaptive cycle; emergency plans excluded.
    pub fn cycle_time(&self) -> Duration {
        self.last_cycle_time
    }

    #[inline]
    pub fn state_of(&self, movement: MovementId) -> SignalState {
        self.heads.get(movement)
    }

    pub fn heads(&self) -> &SignalHeads {
        &self.heads
    }

    /// Transition log, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.heads.history()
    }

    pub fn active_emergency(&self) -> Option<&EmergencyEvent> {
        self.arbiter.active()
    }

    pub fn emergency_history(&self) -> impl Iterator<Item = &EmergencyEvent> {
        self.arbiter.history()
    }

    /// Vehicles counted as discharged since start-up.
    pub fn discharged(&self) -> u64 {
        self.discharged
    }

    pub fn safety_faults(&self) -> u64 {
        self.safety_faults
    }

    /// Tick of the most recent observation frame.
    pub fn last_observation(&self) -> Option<Tick> {
        self.last_frame_at
    }

    // ── Tick loop ─────────────────────────────────────────────────────────

    /// Run `n` ticks, replaying each report into `observer`.
    pub fn run_ticks<O: ControllerObserver + ?Sized>(&mut self, n: u64, observer: &mut O) {
        for _ in 0..n {
            let report = self.step();
            report.deliver(observer);
        }
    }

    /// Advance by exactly one tick.
    pub fn step(&mut self) -> TickReport {
        let tick = self.clock.current_tick;
        let now = self.clock.elapsed();
        let mut report = TickReport::new(self.layout.id, tick);

        let fresh = self.slot.take();
        let had_fresh = fresh.is_some();
        if let Some(frame) = fresh {
            self.latest = Some(frame);
            self.last_frame_at = Some(tick);
        }

        let dt = if self.started { self.clock.tick_duration } else { Duration::ZERO };
        if self.started {
            self.account(dt);
        }
        self.advance(dt, &mut report);
        self.started = true;

        self.drain_commands(now, &mut report);

        if had_fresh {
            if let Some(frame) = &self.latest {
                self.arbiter.observe(now, frame);
            }
        }
        for t in self.arbiter.update(now) {
            self.on_arbiter(&t, &mut report);
            report.emergencies.push(t);
        }

        if self.cursor.stage == Stage::SyncHold
            && self.side.is_none()
            && (self.preempt.is_some() || !self.overrides.is_empty())
        {
            let next = self.cursor.index;
            self.boundary(next, &mut report);
        }

        self.verify(&mut report);
        self.clock.advance();
        report
    }

    fn account(&mut self, dt: Duration) {
        let latest = self.latest.as_ref();
        for lane in &self.layout.lanes {
            let Some(t) = self.lane_timing.get_mut(lane.id.index()) else {
                continue;
            };
            if self.heads.get(lane.movement) == SignalState::Green {
                *t = LaneTiming::default();
                continue;
            }
            t.since_green += dt;
            let demand = latest
                .and_then(|f| f.get(lane.id))
                .is_some_and(|o| o.vehicle_count > 0 || o.pedestrian_count > 0);
            if demand {
                t.wait += dt;
            }
        }
    }

    fn advance(&mut self, dt: Duration, report: &mut TickReport) {
        self.advance_side(dt, report);
        self.cursor.elapsed += dt;
        for _ in 0..Self::MAX_STAGES_PER_TICK {
            let Some(length) = self.cursor.length else {
                return;
            };
            if self.cursor.elapsed < length {
                return;
            }
            let carry = self.cursor.elapsed - length;
            self.expire(report);
            self.cursor.elapsed += carry;
        }
        warn!(intersection = %self.layout.id, "stage chain cut short; resuming next tick");
    }

    fn expire(&mut self, report: &mut TickReport) {
        match self.cursor.stage {
            Stage::Green => self.enter_yellow(report),
            Stage::Yellow => self.enter_all_red(report),
            Stage::AllRed => {
                let next = self.cursor.index + 1;
                self.boundary(next, report);
            }
            Stage::SyncHold => {
                let next = self.cursor.index;
                self.boundary(next, report);
            }
        }
    }

    // ── Stages ────────────────────────────────────────────────────────────

    fn current_phase(&self) -> Option<&SignalPhase> {
        self.plan.phases.get(self.cursor.index)
    }

    /// Heads in `state` that belong to the running phase rather than to an
    /// override beside it.
    fn phase_heads(&self, state: SignalState) -> MovementSet {
        let mut set = self.heads.in_state(state);
        if let Some(side) = self.side.as_ref().filter(|s| s.state == state) {
            set.remove(side.movement);
        }
        set
    }

    fn enter_yellow(&mut self, report: &mut TickReport) {
        let tick = self.clock.current_tick;
        let served = match self.cursor.length {
            Some(l) => self.cursor.elapsed.min(l),
            None => self.cursor.elapsed,
        };
        let ending = self.phase_heads(SignalState::Green);
        self.record_discharge(served, ending);
        for m in ending.iter() {
            if let Some(t) = self.heads.set(m, SignalState::Yellow, tick) {
                report.transitions.push(t);
            }
        }
        let yellow = self.current_phase().map_or(self.config.yellow, |p| p.yellow);
        self.cursor = Cursor::enter(self.cursor.index, Stage::Yellow, Some(yellow));
    }

    fn enter_all_red(&mut self, report: &mut TickReport) {
        let tick = self.clock.current_tick;
        for m in self.phase_heads(SignalState::Yellow).iter() {
            if let Some(t) = self.heads.set(m, SignalState::Red, tick) {
                report.transitions.push(t);
            }
        }
        let all_red = self.current_phase().map_or(self.config.all_red, |p| p.all_red);
        self.cursor = Cursor::enter(self.cursor.index, Stage::AllRed, Some(all_red));
    }

    /// Every head is RED.  Emergency first, then queued overrides, then
    /// the plan's next phase.
    fn boundary(&mut self, next: usize, report: &mut TickReport) {
        if let Some(m) = self.preempt {
            self.start_emergency(m, report);
            return;
        }
        if let Some(ov) = self.overrides.pop_front() {
            let at = next.min(self.plan.len());
            let phase = SignalPhase::new(
                ov.movement,
                PhaseKind::Override,
                ov.duration,
                self.config.yellow,
                self.config.all_red,
            );
            self.plan.phases.insert(at, phase);
            info!(intersection = %self.layout.id, movement = %ov.movement, ticket = %ov.ticket,
                  duration = ?ov.duration, "manual override GREEN");
            report.commands.push(CommandOutcome::applied(ov.ticket, "override GREEN started"));
            self.start_green(at, report);
            return;
        }
        if next < self.plan.len() {
            self.start_green(next, report);
        } else {
            self.start_cycle(report);
        }
    }

    fn start_green(&mut self, index: usize, report: &mut TickReport) {
        let Some(phase) = self.plan.phases.get(index) else {
            self.start_cycle(report);
            return;
        };
        let active = phase.active();
        let held = phase.kind == PhaseKind::Emergency;
        let green = phase.green;

        let mut blocking = self.layout.conflicts.of_set(active).intersection(self.heads.non_red());
        let side = self.side.as_ref().map(|s| (s.movement, s.state, s.left));
        if let Some((m, _, _)) = side {
            blocking.remove(m);
        }
        if let Some(b) = blocking.iter().next() {
            let a = active
                .iter()
                .find(|&a| self.layout.conflicts.conflicts(a, b))
                .unwrap_or(b);
            self.fault(a, b, report);
            return;
        }
        if let Some((m, state, left)) = side {
            let conflicting = self.layout.conflicts.of_set(active).contains(m);
            if conflicting || (state == SignalState::Yellow && active.contains(m)) {
                let hold = if state == SignalState::Green { left + self.config.yellow } else { left };
                debug!(intersection = %self.layout.id, movement = %m, ?hold,
                       "next phase waits for override to clear");
                self.cursor = Cursor::enter(index, Stage::SyncHold, Some(hold));
                return;
            }
            if active.contains(m) {
                // The phase takes the head over from here.
                self.side = None;
            }
        }

        let tick = self.clock.current_tick;
        for m in active.iter() {
            if let Some(t) = self.heads.set(m, SignalState::Green, tick) {
                report.transitions.push(t);
            }
        }
        let length = if held { None } else { Some(green) };
        self.cursor = Cursor::enter(index, Stage::Green, length);
    }

    fn start_cycle(&mut self, report: &mut TickReport) {
        if self.config_dirty {
            self.apply_staged();
        }
        self.cycle += 1;
        let plan = self.allocate();
        if plan.is_empty() {
            self.plan = plan;
            self.cursor = Cursor::enter(0, Stage::AllRed, Some(self.config.minimum_green));
            return;
        }

        info!(
            intersection = %self.layout.id,
            cycle = self.cycle,
            phases = plan.len(),
            cycle_time = ?plan.total_cycle_time(),
            "new signal plan"
        );
        self.last_cycle_time = plan.total_cycle_time();
        report.plan = Some(plan.clone());
        self.plan = plan;

        let hold = self.sync_delay();
        if hold.is_zero() {
            self.start_green(0, report);
        } else {
            debug!(intersection = %self.layout.id, ?hold, "holding all-red for coordinated start");
            self.cursor = Cursor::enter(0, Stage::SyncHold, Some(hold));
        }
    }

    fn start_emergency(&mut self, movement: MovementId, report: &mut TickReport) {
        let waiting = self.cursor.stage == Stage::SyncHold
            && self.plan.emergency_override
            && self
                .plan
                .phases
                .first()
                .is_some_and(|p| p.kind == PhaseKind::Emergency && p.movement == movement);
        if !waiting {
            let mut plan = SignalPlan::new(self.cycle);
            plan.emergency_override = true;
            plan.push(SignalPhase::new(
                movement,
                PhaseKind::Emergency,
                self.config.emergency.max_hold,
                self.config.yellow,
                self.config.all_red,
            ));
            info!(intersection = %self.layout.id, %movement, "emergency phase GREEN");
            report.plan = Some(plan.clone());
            self.plan = plan;
        }
        self.start_green(0, report);
    }

    /// Delay before a cycle start so that it lands on the coordinated
    /// offset.  Only a changed offset causes a hold.
    fn sync_delay(&mut self) -> Duration {
        let Some(target) = self.offset.get() else {
            self.applied_offset = None;
            return Duration::ZERO;
        };
        if self.applied_offset == Some(target) {
            return Duration::ZERO;
        }
        self.applied_offset = Some(target);
        let cycle = self.plan.total_cycle_time().as_nanos();
        if cycle == 0 {
            return Duration::ZERO;
        }
        let now = self.clock.elapsed().as_nanos() % cycle;
        let want = target.as_nanos() % cycle;
        let delay = (want + cycle - now) % cycle;
        info!(intersection = %self.layout.id, offset = ?target, "coordination offset applied");
        Duration::from_nanos(delay as u64)
    }

    fn record_discharge(&mut self, served: Duration, greens: MovementSet) {
        let now = self.clock.elapsed();
        let limit = ThroughputTracker::saturation_limit(served);
        for lane in &self.layout.lanes {
            if !greens.contains(lane.movement) || lane.role == LaneRole::Crosswalk {
                continue;
            }
            let queued = self
                .latest
                .as_ref()
                .and_then(|f| f.get(lane.id))
                .map_or(0, |o| o.vehicle_count);
            let n = queued.min(limit);
            self.throughput.record(lane.id, now, n);
            self.discharged += n as u64;
        }
    }

    // ── Allocation ────────────────────────────────────────────────────────

    fn collect_lane_data(&self) -> Vec<LaneData> {
        self.layout
            .lanes
            .iter()
            .map(|lane| {
                let timing = self.lane_timing.get(lane.id.index()).copied().unwrap_or_default();
                match self.latest.as_ref().and_then(|f| f.get(lane.id)) {
                    Some(obs) => {
                        let queue = self.estimator.estimate(&obs.positions, lane.capacity_m);
                        LaneData::from_observation(obs, queue, timing.wait, timing.since_green)
                    }
                    None => LaneData::missing(lane.id, timing.wait, timing.since_green),
                }
            })
            .collect()
    }

    fn allocate(&mut self) -> SignalPlan {
        let lanes = self.collect_lane_data();
        let approach: Vec<LaneData> = lanes
            .iter()
            .filter(|d| {
                self.layout.lane(d.lane).is_some_and(|l| {
                    l.role == LaneRole::Approach
                        && self
                            .layout
                            .movement(l.movement)
                            .is_some_and(|m| m.kind == MovementKind::Through)
                })
            })
            .cloned()
            .collect();

        let conditions = Conditions::at(&self.clock, self.config.weather);
        let analysis = self.analyzer.analyze(&approach, self.config.green_pool, &conditions);
        let turns = self.turns.evaluate(&self.layout, &lanes);
        let pedestrians = self.pedestrians.evaluate(&self.layout, &lanes);

        let mut status = Vec::with_capacity(lanes.len());
        for d in &lanes {
            let score = analysis.get(d.lane);
            let trend = self.trends.record(d.lane, d.vehicle_count as f32);
            status.push(LaneStatus {
                lane:          d.lane,
                vehicle_count: d.vehicle_count,
                queue:         d.queue.clone(),
                score:         score.map_or(0.0, |s| s.score),
                ratio:         score.map_or(0.0, |s| s.ratio),
                wait_time:     d.wait_time,
                starved:       score.is_some_and(|s| s.starved),
                fallback:      !d.valid,
                trend,
            });
        }
        self.lane_status = status;

        allocation::build_plan(&self.layout, &self.config, &analysis, &turns, &pedestrians, self.cycle)
    }

    fn apply_staged(&mut self) {
        let next = self.staged.read().clone();
        info!(intersection = %self.layout.id, "staged configuration applied");
        self.analyzer = next.analyzer();
        self.turns = next.turn_evaluator();
        self.pedestrians = next.pedestrian_evaluator();
        self.estimator = QueueEstimator::new(next.spacing_threshold_m);
        self.arbiter.config = next.emergency.clone();
        self.config = next;
        self.config_dirty = false;
    }

    // ── Emergencies ───────────────────────────────────────────────────────

    fn on_arbiter(&mut self, t: &ArbiterTransition, report: &mut TickReport) {
        match t {
            ArbiterTransition::Activated(event) => {
                let target = self
                    .layout
                    .lane(event.lane)
                    .filter(|l| l.role != LaneRole::Crosswalk)
                    .map(|l| l.movement);
                let Some(m) = target else {
                    warn!(intersection = %self.layout.id, lane = %event.lane,
                          "emergency on a lane with no vehicle movement ignored");
                    self.arbiter.clear(event.lane);
                    return;
                };
                info!(intersection = %self.layout.id, lane = %event.lane,
                      vehicle = %event.vehicle, movement = %m, "emergency preemption");
                self.preempt = Some(m);
                self.plan.emergency_override = true;
                let side_conflicts = self
                    .side
                    .as_ref()
                    .is_some_and(|s| self.layout.conflicts.conflicts(s.movement, m));
                if side_conflicts {
                    self.end_side(report);
                }
                match self.cursor.stage {
                    Stage::Green => {
                        let index = self.cursor.index;
                        let serving = self.plan.phases.get(index).is_some_and(|p| p.movement == m);
                        if serving {
                            if let Some(p) = self.plan.phases.get_mut(index) {
                                p.kind = PhaseKind::Emergency;
                            }
                            self.cursor.length = None;
                        } else {
                            self.enter_yellow(report);
                        }
                    }
                    Stage::SyncHold => {
                        let next = self.cursor.index;
                        self.boundary(next, report);
                    }
                    Stage::Yellow | Stage::AllRed => {}
                }
            }
            ArbiterTransition::Cleared { event, reason } => {
                if event.activated_at.is_none() {
                    return;
                }
                info!(intersection = %self.layout.id, lane = %event.lane, %reason, "emergency cleared");
                self.preempt = None;
                self.plan.emergency_override = false;
                let holding = self.cursor.stage == Stage::Green
                    && self.current_phase().is_some_and(|p| p.kind == PhaseKind::Emergency);
                if holding {
                    self.enter_yellow(report);
                }
            }
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────

    fn drain_commands(&mut self, now: Duration, report: &mut TickReport) {
        while let Ok(env) = self.rx.try_recv() {
            self.inbox.push(env);
        }
        if self.inbox.is_empty() {
            return;
        }

        let (retracts, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.inbox)
            .into_iter()
            .partition(|e| matches!(e.command, Command::Retract { .. }));
        self.inbox = rest;
        for env in retracts {
            if let Command::Retract { ticket } = env.command {
                let outcome = self.retract(env.ticket, ticket, report);
                report.commands.push(outcome);
            }
        }

        let next = self
            .inbox
            .iter()
            .enumerate()
            .min_by_key(|(i, e)| (e.command.priority(), *i))
            .map(|(i, _)| i);
        if let Some(i) = next {
            let env = self.inbox.remove(i);
            if let Some(outcome) = self.apply(env, now, report) {
                report.commands.push(outcome);
            }
        }
    }

    fn retract(&mut self, own: Ticket, target: Ticket, report: &mut TickReport) -> CommandOutcome {
        if let Some(pos) = self.inbox.iter().position(|e| e.ticket == target) {
            self.inbox.remove(pos);
        } else if let Some(pos) = self.overrides.iter().position(|o| o.ticket == target) {
            self.overrides.remove(pos);
        } else {
            return CommandOutcome::failed(own, format!("{target} already took effect"));
        }
        debug!(intersection = %self.layout.id, %target, "command retracted");
        report.commands.push(CommandOutcome::failed(target, format!("retracted by {own}")));
        CommandOutcome::applied(own, format!("{target} retracted"))
    }

    /// Apply one command.  Overrides that have to wait report their outcome
    /// when they start.
    fn apply(&mut self, env: Envelope, now: Duration, report: &mut TickReport) -> Option<CommandOutcome> {
        let ticket = env.ticket;
        match env.command {
            Command::Override { lane, duration, .. } => {
                let Some(movement) = self.layout.movement_of(lane) else {
                    return Some(CommandOutcome::failed(ticket, format!("unknown lane {lane}")));
                };
                self.start_override(ticket, movement, duration, report)
            }
            Command::AdjustParameter { name, value } => {
                let result = self.staged.write().set_parameter(&name, value);
                match result {
                    Ok(()) => {
                        self.config_dirty = true;
                        info!(intersection = %self.layout.id, %name, value, "parameter staged");
                        Some(CommandOutcome::applied(ticket, format!("{name} = {value} from next cycle")))
                    }
                    Err(reason) => {
                        warn!(intersection = %self.layout.id, %name, value, %reason, "parameter rejected");
                        Some(CommandOutcome::failed(ticket, reason))
                    }
                }
            }
            Command::Emergency { action: EmergencyAction::Activate, lane, vehicle } => {
                if self.arbiter.request(now, lane, vehicle) {
                    Some(CommandOutcome::applied(ticket, "emergency requested"))
                } else {
                    Some(CommandOutcome::applied(ticket, "emergency already tracked; refreshed"))
                }
            }
            Command::Emergency { action: EmergencyAction::Clear, lane, .. } => {
                if self.arbiter.clear(lane) {
                    Some(CommandOutcome::applied(ticket, "emergency clear requested"))
                } else {
                    Some(CommandOutcome::failed(ticket, format!("no emergency on lane {lane}")))
                }
            }
            Command::SkipTurn { lane } => Some(self.skip_turn(ticket, lane)),
            Command::Retract { .. } => None,
        }
    }

    fn start_override(
        &mut self,
        ticket: Ticket,
        movement: MovementId,
        duration: Duration,
        report: &mut TickReport,
    ) -> Option<CommandOutcome> {
        let id = self.layout.id;
        if self.preempt.is_some() {
            debug!(intersection = %id, %movement, %ticket, "override queued behind emergency");
            self.overrides.push_back(QueuedOverride { ticket, movement, duration });
            return None;
        }

        // Already GREEN: take over its remaining time.
        if let Some(side) = self.side.as_mut().filter(|s| s.movement == movement && s.state == SignalState::Green) {
            side.left = duration;
            info!(intersection = %id, %movement, %ticket, ?duration, "override GREEN extended");
            return Some(CommandOutcome::applied(ticket, "override GREEN extended"));
        }
        let host = self.current_phase().map(|p| p.active()).unwrap_or_default();
        if self.cursor.stage == Stage::Green && self.cursor.length.is_some() && host.contains(movement) {
            self.cursor.length = Some(self.cursor.elapsed + duration);
            info!(intersection = %id, %movement, %ticket, ?duration, "running GREEN held for override");
            return Some(CommandOutcome::applied(ticket, "running GREEN set to the override duration"));
        }

        let non_red = self.heads.non_red();
        let blocking = self.layout.conflicts.of(movement).intersection(non_red);
        let beside = blocking.is_empty()
            && !non_red.contains(movement)
            && self.side.is_none()
            && matches!(self.cursor.stage, Stage::Green | Stage::Yellow);
        if beside {
            let tick = self.clock.current_tick;
            if let Some(t) = self.heads.set(movement, SignalState::Green, tick) {
                report.transitions.push(t);
            }
            self.side = Some(SideGreen {
                ticket,
                movement,
                state: SignalState::Green,
                left: duration,
                served: Duration::ZERO,
            });
            info!(intersection = %id, %movement, %ticket, ?duration, "manual override GREEN");
            return Some(CommandOutcome::applied(ticket, "override GREEN started"));
        }

        debug!(intersection = %id, %movement, %ticket, "override waits for conflicts to clear");
        self.overrides.push_back(QueuedOverride { ticket, movement, duration });
        if self.side.as_ref().is_some_and(|s| blocking.contains(s.movement)) {
            self.end_side(report);
        }
        if self.cursor.stage == Stage::Green && !host.intersection(blocking).is_empty() {
            self.enter_yellow(report);
        }
        None
    }

    fn advance_side(&mut self, dt: Duration, report: &mut TickReport) {
        let Some(side) = self.side.as_mut() else {
            return;
        };
        if side.state == SignalState::Green {
            side.served += dt;
        }
        side.left = side.left.saturating_sub(dt);
        let (state, done) = (side.state, side.left.is_zero());
        if !done {
            return;
        }
        match state {
            SignalState::Green => self.end_side(report),
            _ => self.clear_side(report),
        }
    }

    /// Side override GREEN → YELLOW.
    fn end_side(&mut self, report: &mut TickReport) {
        let Some((movement, served)) = self
            .side
            .as_ref()
            .filter(|s| s.state == SignalState::Green)
            .map(|s| (s.movement, s.served))
        else {
            return;
        };
        self.record_discharge(served, MovementSet::single(movement));
        if let Some(t) = self.heads.set(movement, SignalState::Yellow, self.clock.current_tick) {
            report.transitions.push(t);
        }
        let yellow = self.config.yellow;
        if let Some(side) = self.side.as_mut() {
            side.state = SignalState::Yellow;
            side.left = yellow;
        }
    }

    /// Side override YELLOW → RED.
    fn clear_side(&mut self, report: &mut TickReport) {
        let Some(side) = self.side.take() else {
            return;
        };
        if let Some(t) = self.heads.set(side.movement, SignalState::Red, self.clock.current_tick) {
            report.transitions.push(t);
        }
        debug!(intersection = %self.layout.id, movement = %side.movement, ticket = %side.ticket,
               "override finished");
    }

    /// Drop the protected phase for `lane`'s turn if it has not begun, and
    /// let the turn run permissively with its parent instead.
    fn skip_turn(&mut self, ticket: Ticket, lane: LaneId) -> CommandOutcome {
        let Some(movement) = self.layout.movement_of(lane) else {
            return CommandOutcome::failed(ticket, format!("unknown lane {lane}"));
        };
        let Some(pos) = self
            .plan
            .phases
            .iter()
            .position(|p| p.movement == movement && p.kind == PhaseKind::ProtectedTurn)
        else {
            return CommandOutcome::failed(ticket, "no protected phase for this turn in the current plan");
        };
        let first_pending = match self.cursor.stage {
            Stage::SyncHold => self.cursor.index,
            _ => self.cursor.index + 1,
        };
        if pos < first_pending {
            return CommandOutcome::failed(ticket, "protected phase already began");
        }
        self.plan.phases.remove(pos);

        let parent = self.layout.movement(movement).and_then(|m| m.kind.parent());
        let conflicts = self.layout.conflicts.of(movement);
        let host = self.plan.phases.iter_mut().skip(first_pending).find(|p| {
            Some(p.movement) == parent && conflicts.intersection(p.active()).is_empty()
        });
        if let Some(p) = host {
            p.companions.insert(movement);
        }
        info!(intersection = %self.layout.id, %movement, "protected turn phase skipped");
        CommandOutcome::applied(ticket, "protected turn phase dropped for this cycle")
    }

    // ── Safety ────────────────────────────────────────────────────────────

    fn verify(&mut self, report: &mut TickReport) {
        if let Some((a, b)) = self.layout.conflicts.violation(self.heads.non_red()) {
            self.fault(a, b, report);
        }
    }

    fn fault(&mut self, a: MovementId, b: MovementId, report: &mut TickReport) {
        error!(intersection = %self.layout.id, %a, %b,
               "conflicting movements non-RED together; forcing all-red");
        self.safety_faults += 1;
        report.faults.push((a, b));
        let tick = self.clock.current_tick;
        report.transitions.extend(self.heads.force_all_red(tick));
        self.side = None;
        self.plan = SignalPlan::new(self.cycle);
        let clearance = self.config.all_red.max(self.clock.tick_duration);
        self.cursor = Cursor::enter(0, Stage::AllRed, Some(clearance));
    }

    // ── Monitoring ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ControllerSnapshot {
        let active = self.current_phase().map(|p| p.active()).unwrap_or_default();
        let remaining = self.cursor.length.map(|l| l.saturating_sub(self.cursor.elapsed));
        let movements = self
            .layout
            .movements
            .iter()
            .map(|m| {
                let state = self.heads.get(m.id);
                let walk = m.kind.is_pedestrian().then(|| WalkSignal::from(state));
                let side = self.side.as_ref().filter(|s| s.movement == m.id).map(|s| s.left);
                let remaining = match state {
                    SignalState::Red => None,
                    _ if side.is_some() => side,
                    SignalState::Yellow => remaining,
                    SignalState::Green if active.contains(m.id) => remaining,
                    SignalState::Green => None,
                };
                MovementStatus { movement: m.id, name: m.name.clone(), state, walk, remaining }
            })
            .collect();
        let now = self.clock.elapsed();
        ControllerSnapshot {
            intersection:   self.layout.id,
            tick:           self.clock.current_tick,
            cycle:          self.cycle,
            stage:          self.cursor.stage,
            phase_index:    self.cursor.index,
            elapsed:        self.cursor.elapsed,
            plan:           self.plan.clone(),
            movements,
            lanes:          self.lane_status.clone(),
            emergency:      self.arbiter.active().cloned(),
            applied_offset: self.applied_offset.unwrap_or_default(),
            throughput_vph: self.throughput.total_throughput(now),
            safety_faults:  self.safety_faults,
        }
    }
}
