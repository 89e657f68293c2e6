//! `tsc-emergency`: lifecycle and ordering of emergency preemption requests.
//!
//! The arbiter owns every [`EmergencyEvent`].  Controllers feed it the
//! latest observation frame and read back [`ArbiterTransition`]s; they never
//! mutate events directly.
//!
//! # Ordering
//!
//! Events are served strictly in detection order.  Events first seen on the
//! same tick are ordered by the configured [`TieBreak`] policy, then queued
//! behind everything detected earlier.  Only one event is active at a time.
//!
//! # Release
//!
//! The active event is released when its lane has not reported an emergency
//! vehicle for `debounce`, or when it has held the intersection for
//! `max_hold`, whichever comes first.  Manually requested events ignore the
//! debounce and release on an explicit clear or on `max_hold`.

pub mod arbiter;
pub mod event;


pub use arbiter::{ArbiterConfig, ArbiterTransition, EmergencyArbiter};
pub use event::{ClearReason, EmergencyEvent, TieBreak};
