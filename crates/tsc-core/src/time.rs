//! Control-time model.
//!
//! # Design
//!
//! Every controller advances on a fixed-interval discrete tick.  Time is a
//! monotonically increasing `Tick` counter; the mapping to elapsed control
//! time is held in `ControlClock`:
//!
//!   elapsed = tick * tick_duration
//!
//! Using an integer tick as the canonical time unit keeps phase arithmetic
//! exact (no floating-point drift): a phase of `d` lasts exactly
//! `ceil(d / tick_duration)` ticks.  Durations themselves are
//! `std::time::Duration`, which is also exact.

use std::fmt;
use std::time::Duration;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute control tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

/// Ticks from `rhs` to `self`; zero when `rhs` is later.
impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.since(rhs)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── ControlClock ──────────────────────────────────────────────────────────────

/// Converts between tick counts and elapsed control time.
///
/// `ControlClock` is cheap to copy and holds no heap data.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlClock {
    /// Length of one control tick.  Default: 1 s.
    pub tick_duration: Duration,
    /// Seconds after local midnight at tick 0.  Drives time-of-day
    /// classification only.
    pub start_secs_of_day: u32,
    /// The current tick, advanced once per control iteration.
    pub current_tick: Tick,
}

impl ControlClock {
    /// Create a clock starting at tick 0 with the given resolution.
    ///
    /// A zero `tick_duration` is replaced with 1 ms so tick conversions never
    /// divide by zero.
    pub fn new(tick_duration: Duration, start_secs_of_day: u32) -> Self {
        let tick_duration = if tick_duration.is_zero() {
            Duration::from_millis(1)
        } else {
            tick_duration
        };
        Self {
            tick_duration,
            start_secs_of_day: start_secs_of_day % 86_400,
            current_tick: Tick::ZERO,
        }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Elapsed control time since tick 0.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.duration_of(self.current_tick.0)
    }

    /// Control time spanned by `ticks` ticks.
    #[inline]
    pub fn duration_of(&self, ticks: u64) -> Duration {
        self.tick_duration.saturating_mul(ticks.min(u32::MAX as u64) as u32)
    }

    /// Elapsed control time at an arbitrary tick.
    #[inline]
    pub fn time_at(&self, tick: Tick) -> Duration {
        self.duration_of(tick.0)
    }

    /// How many ticks span `d`? Rounds up, so a phase is never cut short.
    #[inline]
    pub fn ticks_for(&self, d: Duration) -> u64 {
        let tick_ns = self.tick_duration.as_nanos();
        d.as_nanos().div_ceil(tick_ns) as u64
    }

    /// Local seconds after midnight at the current tick.
    pub fn seconds_of_day(&self) -> u32 {
        let elapsed = self.elapsed().as_secs();
        ((self.start_secs_of_day as u64 + elapsed) % 86_400) as u32
    }
}

impl Default for ControlClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 0)
    }
}

impl fmt::Display for ControlClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sod = self.seconds_of_day();
        write!(
            f,
            "{} ({:02}:{:02}:{:02})",
            self.current_tick,
            sod / 3_600,
            (sod % 3_600) / 60,
            sod % 60
        )
    }
}
