//! `tsc-control`: one adaptive signal controller per intersection.
//!
//! A [`SignalController`] owns the heads of one intersection and advances on
//! a fixed [`ControlClock`][tsc_core::ControlClock] tick.  At every cycle
//! boundary it estimates queues, scores lanes, and allocates the green pool
//! into a [`SignalPlan`][tsc_phase::SignalPlan]; it then walks the plan
//! GREEN → YELLOW → ALL-RED phase by phase.
//!
//! | Module         | Contents                                                    |
//! |----------------|-------------------------------------------------------------|
//! | [`config`]     | `ControllerConfig`, runtime parameter adjustment            |
//! | [`allocation`] | `build_plan`: green split, turn and crosswalk placement     |
//! | [`heads`]      | `SignalHeads`, `Transition` log                             |
//! | [`command`]    | `Command`, `CommandHandle`, tickets and outcomes            |
//! | [`handoff`]    | `ObservationSlot`, `OffsetCell`                             |
//! | [`controller`] | `SignalController` stage machine                            |
//! | [`builder`]    | `ControllerBuilder`                                         |
//! | [`observer`]   | `ControllerObserver`, `TickReport`                          |
//! | [`snapshot`]   | `ControllerSnapshot` for monitoring                         |
//!
//! # Quick start
//!
//! ```rust,ignore
//! let mut controller = ControllerBuilder::new(layout).build()?;
//! let slot = controller.observation_slot();
//!
//! slot.publish(frame);
//! controller.run_ticks(60, &mut NoopObserver);
//! println!("{:?}", controller.snapshot().stage);
//! ```
//!
//! # Safety
//!
//! Every step ends with a conflict check over the non-RED heads.  A
//! violation forces all heads RED, abandons the plan, and starts a fresh
//! cycle after the clearance interval.

pub mod allocation;
pub mod builder;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod handoff;
pub mod heads;
pub mod observer;
pub mod snapshot;


pub use allocation::{build_plan, movement_green};
pub use builder::ControllerBuilder;
pub use command::{Command, CommandHandle, CommandOutcome, CommandReply, EmergencyAction, Ticket};
pub use config::ControllerConfig;
pub use controller::SignalController;
pub use error::{ControlError, ControlResult};
pub use handoff::{ObservationSlot, OffsetCell};
pub use heads::{SignalHeads, Transition};
pub use observer::{ControllerObserver, NoopObserver, TickReport};
pub use snapshot::{ControllerSnapshot, LaneStatus, MovementStatus, Stage};
