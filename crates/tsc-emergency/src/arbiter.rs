//! The `EmergencyArbiter` and its per-tick update.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tracing::{debug, info};
use tsc_core::{LaneId, ObservationFrame, VehicleClass};

use crate::{ClearReason, EmergencyEvent, TieBreak};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArbiterConfig {
    /// Unobserved time after which an event is released.
    pub debounce:  Duration,
    /// Hard cap on how long one event may hold the intersection.
    pub max_hold:  Duration,
    pub tie_break: TieBreak,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            debounce:  Duration::from_secs(5),
            max_hold:  Duration::from_secs(120),
            tie_break: TieBreak::DetectionOrder,
        }
    }
}

/// State changes reported back to the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum ArbiterTransition {
    Activated(EmergencyEvent),
    Cleared { event: EmergencyEvent, reason: ClearReason },
}

/// Owns every emergency event for one intersection.
#[derive(Debug, Default)]
pub struct EmergencyArbiter {
    pub config:      ArbiterConfig,
    active:          Option<EmergencyEvent>,
    pending:         VecDeque<EmergencyEvent>,
    history:         VecDeque<EmergencyEvent>,
    next_seq:        u64,
    /// Set by `clear` on the active lane; consumed by the next `update`.
    clear_requested: bool,
    /// Lanes released by `max_hold`, with the last time they were seen.
    /// Detections there are ignored until the lane stays quiet for `debounce`.
    cooldown:        BTreeMap<LaneId, Duration>,
}

impl EmergencyArbiter {
    const HISTORY_LEN: usize = 64;

    pub fn new(config: ArbiterConfig) -> Self {
        Self { config, ..Self::default() }
    }

    #[inline]
    pub fn active(&self) -> Option<&EmergencyEvent> {
        self.active.as_ref()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn pending(&self) -> impl Iterator<Item = &EmergencyEvent> {
        self.pending.iter()
    }

    /// Cleared events, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &EmergencyEvent> {
        self.history.iter()
    }

    fn tracked_mut(&mut self, lane: LaneId) -> Option<&mut EmergencyEvent> {
        if self.active.as_ref().is_some_and(|a| a.lane == lane) {
            return self.active.as_mut();
        }
        self.pending.iter_mut().find(|e| e.lane == lane)
    }

    fn refresh(event: &mut EmergencyEvent, vehicle: VehicleClass, now: Duration, distance_m: f32) {
        event.last_seen = now;
        event.distance_m = distance_m;
        if let Some(level) = vehicle.priority_level().filter(|&l| l < event.priority_level) {
            event.vehicle = vehicle;
            event.priority_level = level;
        }
    }

    /// Fold one observation frame into the event set.
    ///
    /// Lanes already tracked refresh `last_seen`; new lanes become pending
    /// events ordered by the tie-break policy among themselves.
    pub fn observe(&mut self, now: Duration, frame: &ObservationFrame) {
        let mut fresh: Vec<EmergencyEvent> = Vec::new();
        for obs in frame.emergencies() {
            let Some(vehicle) = obs.emergency else { continue };
            let distance = obs.positions.first().copied().unwrap_or(f32::MAX);
            if let Some(seen) = self.cooldown.get_mut(&obs.lane) {
                *seen = now;
                continue;
            }
            if let Some(ev) = self.tracked_mut(obs.lane) {
                Self::refresh(ev, vehicle, now, distance);
            } else if let Some(ev) = fresh.iter_mut().find(|e| e.lane == obs.lane) {
                Self::refresh(ev, vehicle, now, distance);
            } else {
                fresh.push(EmergencyEvent::new(0, vehicle, obs.lane, now, distance));
            }
        }

        match self.config.tie_break {
            TieBreak::DetectionOrder => {}
            TieBreak::VehicleClass => fresh.sort_by_key(|e| e.priority_level),
            TieBreak::Proximity => fresh.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m)),
        }

        for mut ev in fresh {
            ev.seq = self.next_seq;
            self.next_seq += 1;
            info!(lane = %ev.lane, vehicle = %ev.vehicle, seq = ev.seq, "emergency vehicle detected");
            self.pending.push_back(ev);
        }
    }

    /// Queue a commanded emergency for `lane`.  Returns `false` when the lane
    /// already has an event, which is then refreshed instead.
    pub fn request(&mut self, now: Duration, lane: LaneId, vehicle: VehicleClass) -> bool {
        if let Some(ev) = self.tracked_mut(lane) {
            let distance = ev.distance_m;
            Self::refresh(ev, vehicle, now, distance);
            ev.manual = true;
            return false;
        }
        let mut ev = EmergencyEvent::new(self.next_seq, vehicle, lane, now, f32::MAX);
        ev.manual = true;
        self.next_seq += 1;
        info!(lane = %lane, vehicle = %vehicle, "emergency requested by command");
        self.pending.push_back(ev);
        true
    }

    /// Drop the event on `lane`, active or pending.  The release shows up as
    /// a `Cleared` transition on the next `update`.
    pub fn clear(&mut self, lane: LaneId) -> bool {
        if self.active.as_ref().is_some_and(|a| a.lane == lane) {
            self.clear_requested = true;
            return true;
        }
        let before = self.pending.len();
        self.pending.retain(|e| e.lane != lane);
        before != self.pending.len()
    }

    fn retire(&mut self, mut event: EmergencyEvent, reason: ClearReason, out: &mut Vec<ArbiterTransition>) {
        info!(lane = %event.lane, vehicle = %event.vehicle, %reason, "emergency cleared");
        event.active = false;
        if reason == ClearReason::MaxHold {
            self.cooldown.insert(event.lane, event.last_seen);
        }
        if self.history.len() == Self::HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
        out.push(ArbiterTransition::Cleared { event, reason });
    }

    /// Apply release rules and promote the next pending event.
    pub fn update(&mut self, now: Duration) -> Vec<ArbiterTransition> {
        let mut out = Vec::new();
        let debounce = self.config.debounce;

        if let Some(active) = self.active.take() {
            let reason = if self.clear_requested {
                Some(ClearReason::Manual)
            } else if active.held_for(now) >= self.config.max_hold {
                Some(ClearReason::MaxHold)
            } else if !active.manual && now.saturating_sub(active.last_seen) >= debounce {
                Some(ClearReason::Unobserved)
            } else {
                None
            };
            match reason {
                Some(reason) => self.retire(active, reason, &mut out),
                None => self.active = Some(active),
            }
        }
        self.clear_requested = false;
        self.cooldown.retain(|_, seen| now.saturating_sub(*seen) < debounce);

        // Pending vehicles that left before being served.
        let (stale, keep): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|e| !e.manual && now.saturating_sub(e.last_seen) >= debounce);
        self.pending = keep.into();
        for ev in stale {
            debug!(lane = %ev.lane, "pending emergency left before service");
            self.retire(ev, ClearReason::Unobserved, &mut out);
        }

        if self.active.is_none() {
            if let Some(mut next) = self.pending.pop_front() {
                next.active = true;
                next.activated_at = Some(now);
                info!(lane = %next.lane, vehicle = %next.vehicle, seq = next.seq, "emergency preemption activated");
                out.push(ArbiterTransition::Activated(next.clone()));
                self.active = Some(next);
            }
        }
        out
    }
}
