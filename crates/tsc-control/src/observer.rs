//! Controller observer trait and per-tick reports.

use tsc_core::{IntersectionId, MovementId, Tick};
use tsc_emergency::ArbiterTransition;
use tsc_phase::SignalPlan;

use crate::{CommandOutcome, Transition};

/// Everything that happened during one controller tick.
///
/// `step` returns this instead of calling an observer directly so that many
/// controllers can tick in parallel and be observed sequentially afterwards.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    pub intersection: IntersectionId,
    pub tick:         Tick,
    pub transitions:  Vec<Transition>,
    /// A plan that started this tick.
    pub plan:         Option<SignalPlan>,
    pub emergencies:  Vec<ArbiterTransition>,
    pub commands:     Vec<CommandOutcome>,
    /// Conflicting pairs found non-RED together; each forced all-red.
    pub faults:       Vec<(MovementId, MovementId)>,
}

impl TickReport {
    pub fn new(intersection: IntersectionId, tick: Tick) -> Self {
        Self { intersection, tick, ..Self::default() }
    }

    /// Replay this report into `observer` in a fixed order.
    pub fn deliver<O: ControllerObserver + ?Sized>(&self, observer: &mut O) {
        let id = self.intersection;
        observer.on_tick_start(id, self.tick);
        for &(a, b) in &self.faults {
            observer.on_safety_fault(id, a, b);
        }
        for e in &self.emergencies {
            observer.on_emergency(id, e);
        }
        for c in &self.commands {
            observer.on_command(id, c);
        }
        if let Some(plan) = &self.plan {
            observer.on_plan(id, plan);
        }
        for t in &self.transitions {
            observer.on_transition(id, t);
        }
        observer.on_tick_end(id, self.tick);
    }
}

/// Callbacks fed from [`TickReport`]s.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example: transition printer
///
/// ```rust,ignore
/// struct Printer;
///
/// impl ControllerObserver for Printer {
///     fn on_transition(&mut self, id: IntersectionId, t: &Transition) {
///         println!("{id} {} {} -> {}", t.movement, t.from, t.to);
///     }
/// }
/// ```
pub trait ControllerObserver {
    fn on_tick_start(&mut self, _id: IntersectionId, _tick: Tick) {}

    fn on_transition(&mut self, _id: IntersectionId, _t: &Transition) {}

    /// A new plan started: a fresh cycle, or an emergency plan.
    fn on_plan(&mut self, _id: IntersectionId, _plan: &SignalPlan) {}

    fn on_emergency(&mut self, _id: IntersectionId, _t: &ArbiterTransition) {}

    /// An accepted command took effect or failed at apply time.
    fn on_command(&mut self, _id: IntersectionId, _outcome: &CommandOutcome) {}

    fn on_safety_fault(&mut self, _id: IntersectionId, _a: MovementId, _b: MovementId) {}

    fn on_tick_end(&mut self, _id: IntersectionId, _tick: Tick) {}
}

/// A [`ControllerObserver`] that does nothing.
pub struct NoopObserver;

impl ControllerObserver for NoopObserver {}
