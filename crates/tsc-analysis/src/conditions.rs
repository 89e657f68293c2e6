//! Time-of-day and weather adjustments.
//!
//! The controller builds one read-only `Conditions` snapshot per allocation
//! and hands it to the analyzer; nothing here is global state.

use tsc_core::ControlClock;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeOfDay {
    PeakMorning,
    PeakEvening,
    #[default]
    OffPeak,
    Night,
}

impl TimeOfDay {
    const PEAK_MORNING: (u32, u32) = (7 * 3_600, 9 * 3_600 + 30 * 60);
    const PEAK_EVENING: (u32, u32) = (16 * 3_600 + 30 * 60, 19 * 3_600);
    const NIGHT_START:  u32 = 22 * 3_600;
    const NIGHT_END:    u32 = 6 * 3_600;

    /// Classify a local time given as seconds after midnight.
    pub fn from_seconds_of_day(secs: u32) -> TimeOfDay {
        let s = secs % 86_400;
        if (Self::PEAK_MORNING.0..=Self::PEAK_MORNING.1).contains(&s) {
            TimeOfDay::PeakMorning
        } else if (Self::PEAK_EVENING.0..=Self::PEAK_EVENING.1).contains(&s) {
            TimeOfDay::PeakEvening
        } else if s >= Self::NIGHT_START || s <= Self::NIGHT_END {
            TimeOfDay::Night
        } else {
            TimeOfDay::OffPeak
        }
    }

    pub fn green_multiplier(self) -> f32 {
        match self {
            TimeOfDay::PeakMorning | TimeOfDay::PeakEvening => 1.2,
            TimeOfDay::Night => 0.7,
            TimeOfDay::OffPeak => 1.0,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WeatherCondition {
    #[default]
    Clear,
    Rain,
    Snow,
    Fog,
    HeavyRain,
    HeavySnow,
}

impl WeatherCondition {
    pub fn green_multiplier(self) -> f32 {
        match self {
            WeatherCondition::HeavyRain | WeatherCondition::HeavySnow => 1.1,
            WeatherCondition::Rain | WeatherCondition::Snow => 1.05,
            WeatherCondition::Fog | WeatherCondition::Clear => 1.0,
        }
    }
}

/// Combined adjustment applied to one allocation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingAdjustment {
    /// Scales the green pool only; yellow and the green bounds stay fixed.
    pub green_multiplier: f32,
}

impl Default for TimingAdjustment {
    fn default() -> Self {
        Self { green_multiplier: 1.0 }
    }
}

/// Read-only snapshot of ambient conditions for one allocation.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Conditions {
    pub time_of_day: TimeOfDay,
    pub weather:     WeatherCondition,
}

impl Conditions {
    pub fn new(time_of_day: TimeOfDay, weather: WeatherCondition) -> Self {
        Self { time_of_day, weather }
    }

    /// Conditions at the clock's current local time.
    pub fn at(clock: &ControlClock, weather: WeatherCondition) -> Self {
        Self::new(TimeOfDay::from_seconds_of_day(clock.seconds_of_day()), weather)
    }

    pub fn adjustment(&self) -> TimingAdjustment {
        TimingAdjustment {
            green_multiplier: self.time_of_day.green_multiplier()
                * self.weather.green_multiplier(),
        }
    }
}
