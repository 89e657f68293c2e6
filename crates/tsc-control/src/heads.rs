//! Displayed signal state per movement and the bounded transition log.

use std::collections::VecDeque;

use tracing::{debug, error};
use tsc_core::{MovementId, SignalState, Tick};
use tsc_phase::MovementSet;

/// One head changing state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub tick:     Tick,
    pub movement: MovementId,
    pub from:     SignalState,
    pub to:       SignalState,
}

/// The heads of one intersection, indexed by `MovementId`.
///
/// All heads start RED.  `set` refuses any change other than
/// RED → GREEN → YELLOW → RED; only `force_all_red` may skip YELLOW.
#[derive(Clone, Debug)]
pub struct SignalHeads {
    states:      Vec<SignalState>,
    history:     VecDeque<Transition>,
    history_len: usize,
}

impl SignalHeads {
    pub fn new(movements: usize, history_len: usize) -> Self {
        Self {
            states: vec![SignalState::Red; movements],
            history: VecDeque::with_capacity(history_len.min(1_024)),
            history_len,
        }
    }

    #[inline]
    pub fn get(&self, m: MovementId) -> SignalState {
        self.states.get(m.index()).copied().unwrap_or_default()
    }

    pub fn states(&self) -> &[SignalState] {
        &self.states
    }

    /// Movements currently GREEN or YELLOW.
    pub fn non_red(&self) -> MovementSet {
        self.with_state(|s| s.is_active())
    }

    pub fn in_state(&self, state: SignalState) -> MovementSet {
        self.with_state(|s| s == state)
    }

    fn with_state(&self, pred: impl Fn(SignalState) -> bool) -> MovementSet {
        self.states
            .iter()
            .enumerate()
            .filter(|&(_, &s)| pred(s))
            .map(|(i, _)| MovementId(i as u16))
            .collect()
    }

    /// Transitions oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.history.iter()
    }

    fn record(&mut self, t: Transition) {
        if self.history_len == 0 {
            return;
        }
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(t);
    }

    /// Change one head.  Returns the transition, or `None` when nothing
    /// changed or the step would be illegal.
    pub fn set(&mut self, m: MovementId, to: SignalState, tick: Tick) -> Option<Transition> {
        let slot = self.states.get_mut(m.index())?;
        let from = *slot;
        if from == to {
            return None;
        }
        if !from.can_transition_to(to) {
            error!(movement = %m, %from, %to, "illegal signal transition refused");
            return None;
        }
        *slot = to;
        let t = Transition { tick, movement: m, from, to };
        debug!(movement = %m, %from, %to, %tick, "signal transition");
        self.record(t);
        Some(t)
    }

    /// Drive every head to RED at once.  Reserved for conflict recovery.
    pub fn force_all_red(&mut self, tick: Tick) -> Vec<Transition> {
        let mut out = Vec::new();
        for i in 0..self.states.len() {
            let from = self.states[i];
            if from != SignalState::Red {
                self.states[i] = SignalState::Red;
                let t = Transition { tick, movement: MovementId(i as u16), from, to: SignalState::Red };
                self.record(t);
                out.push(t);
            }
        }
        out
    }
}
