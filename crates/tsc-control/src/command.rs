//! External commands and the bounded channel that carries them.
//!
//! Commands are validated synchronously by [`CommandHandle::submit`], which
//! answers with a [`CommandReply`].  Accepted commands queue on a bounded
//! channel; the controller drains it at the start of each tick and applies
//! at most one command per tick, highest priority first, FIFO within a
//! priority.  Retractions are processed as soon as they are drained.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::warn;
use tsc_core::{LaneId, SignalState, VehicleClass};
use tsc_phase::{IntersectionLayout, LaneRole, MovementKind};

use crate::ControllerConfig;

/// Identifies one accepted command.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EmergencyAction {
    Activate,
    Clear,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Command {
    /// Serve the lane's movement GREEN for `duration` at the next phase
    /// boundary where every conflicting movement is RED.
    Override { lane: LaneId, state: SignalState, duration: Duration },
    /// Stage a named parameter change for the next cycle.
    AdjustParameter { name: String, value: f64 },
    Emergency { action: EmergencyAction, lane: LaneId, vehicle: VehicleClass },
    /// Cancel a command that has not taken effect yet.
    Retract { ticket: Ticket },
    /// Drop this cycle's protected phase for a turn lane if it has not begun.
    SkipTurn { lane: LaneId },
}

impl Command {
    /// Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Command::Emergency { .. } => 0,
            Command::Retract { .. } => 0,
            Command::Override { .. } | Command::SkipTurn { .. } => 1,
            Command::AdjustParameter { .. } => 2,
        }
    }
}

/// Synchronous answer to a submission.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandReply {
    pub ticket:   Option<Ticket>,
    pub accepted: bool,
    pub reason:   String,
}

impl CommandReply {
    fn accepted(ticket: Ticket, reason: impl Into<String>) -> Self {
        Self { ticket: Some(ticket), accepted: true, reason: reason.into() }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self { ticket: None, accepted: false, reason: reason.into() }
    }
}

/// What eventually happened to an accepted command.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandOutcome {
    pub ticket:  Ticket,
    pub applied: bool,
    pub detail:  String,
}

impl CommandOutcome {
    pub(crate) fn applied(ticket: Ticket, detail: impl Into<String>) -> Self {
        Self { ticket, applied: true, detail: detail.into() }
    }

    pub(crate) fn failed(ticket: Ticket, detail: impl Into<String>) -> Self {
        Self { ticket, applied: false, detail: detail.into() }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Envelope {
    pub ticket:  Ticket,
    pub command: Command,
}

// ── CommandHandle ─────────────────────────────────────────────────────────────

/// Cloneable sender half of a controller's command queue.
#[derive(Clone)]
pub struct CommandHandle {
    tx:          SyncSender<Envelope>,
    next_ticket: Arc<AtomicU64>,
    layout:      Arc<IntersectionLayout>,
    staged:      Arc<RwLock<ControllerConfig>>,
}

pub(crate) fn channel(
    capacity: usize,
    layout: Arc<IntersectionLayout>,
    staged: Arc<RwLock<ControllerConfig>>,
) -> (CommandHandle, Receiver<Envelope>) {
    let (tx, rx) = sync_channel(capacity.max(1));
    let handle = CommandHandle { tx, next_ticket: Arc::new(AtomicU64::new(0)), layout, staged };
    (handle, rx)
}

impl CommandHandle {
    /// Validate and enqueue.  Never blocks.
    pub fn submit(&self, command: Command) -> CommandReply {
        if let Err(reason) = self.validate(&command) {
            warn!(intersection = %self.layout.id, ?command, %reason, "command rejected");
            return CommandReply::rejected(reason);
        }
        let reason = match &command {
            Command::Override { .. } => "GREEN once every conflicting movement is RED",
            Command::AdjustParameter { .. } => "staged for the next cycle",
            _ => "queued",
        };
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        match self.tx.try_send(Envelope { ticket, command }) {
            Ok(()) => CommandReply::accepted(ticket, reason),
            Err(TrySendError::Full(_)) => {
                warn!(intersection = %self.layout.id, "command queue full");
                CommandReply::rejected("command queue full")
            }
            Err(TrySendError::Disconnected(_)) => CommandReply::rejected("controller stopped"),
        }
    }

    pub fn override_green(&self, lane: LaneId, duration: Duration) -> CommandReply {
        self.submit(Command::Override { lane, state: SignalState::Green, duration })
    }

    pub fn adjust_parameter(&self, name: &str, value: f64) -> CommandReply {
        self.submit(Command::AdjustParameter { name: name.to_string(), value })
    }

    pub fn emergency(&self, action: EmergencyAction, lane: LaneId, vehicle: VehicleClass) -> CommandReply {
        self.submit(Command::Emergency { action, lane, vehicle })
    }

    pub fn retract(&self, ticket: Ticket) -> CommandReply {
        self.submit(Command::Retract { ticket })
    }

    pub fn skip_turn(&self, lane: LaneId) -> CommandReply {
        self.submit(Command::SkipTurn { lane })
    }

    fn validate(&self, command: &Command) -> Result<(), String> {
        match command {
            Command::Override { lane, state, duration } => {
                self.layout
                    .lane(*lane)
                    .ok_or_else(|| format!("unknown lane {lane}"))?;
                if *state != SignalState::Green {
                    return Err(format!(
                        "override to {state} not supported; only GREEN can be forced"
                    ));
                }
                let max = self.staged.read().maximum_green;
                if duration.is_zero() || *duration > max {
                    return Err(format!("override duration must be within (0, {max:?}]"));
                }
                Ok(())
            }
            Command::AdjustParameter { name, value } => {
                let mut probe = self.staged.read().clone();
                probe.set_parameter(name, *value)
            }
            Command::Emergency { action, lane, vehicle } => {
                let l = self
                    .layout
                    .lane(*lane)
                    .ok_or_else(|| format!("unknown lane {lane}"))?;
                if l.role == LaneRole::Crosswalk {
                    return Err(format!("lane {} is a crosswalk", l.name));
                }
                if *action == EmergencyAction::Activate && !vehicle.is_emergency() {
                    return Err(format!("{vehicle} is not an emergency vehicle class"));
                }
                Ok(())
            }
            Command::Retract { ticket } => {
                if ticket.0 >= self.next_ticket.load(Ordering::Relaxed) {
                    return Err(format!("unknown ticket {ticket}"));
                }
                Ok(())
            }
            Command::SkipTurn { lane } => {
                let l = self
                    .layout
                    .lane(*lane)
                    .ok_or_else(|| format!("unknown lane {lane}"))?;
                match self.layout.movement(l.movement).map(|m| &m.kind) {
                    Some(MovementKind::Turn { .. }) => Ok(()),
                    _ => Err(format!("lane {} is not a turn lane", l.name)),
                }
            }
        }
    }
}
