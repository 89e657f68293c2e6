//! Controller timing parameters and runtime adjustment.

use std::time::Duration;

use tsc_analysis::{AnalyzerConfig, TrafficAnalyzer, VehicleWeights, WeatherCondition};
use tsc_emergency::ArbiterConfig;
use tsc_phase::{PedestrianEvaluator, TurnEvaluator};

use crate::{ControlError, ControlResult};

/// Everything a [`SignalController`][crate::SignalController] needs to time
/// one intersection.
///
/// Changes made through `adjust_parameter` are staged and take effect at
/// the next cycle boundary, so a running plan never changes underneath the
/// heads it drives.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    pub minimum_green:         Duration,
    pub maximum_green:         Duration,
    /// Fixed for every phase; never scaled or prioritized.
    pub yellow:                Duration,
    pub all_red:               Duration,
    /// Green time distributed across through movements each cycle.
    pub green_pool:            Duration,
    pub turn_activation:       u32,
    pub pedestrian_activation: u32,
    pub walking_speed_mps:     f32,
    pub minimum_crossing:      Duration,
    pub starvation_threshold:  Duration,
    pub fairness_threshold:    Duration,
    /// Largest gap between queued vehicles (m).
    pub spacing_threshold_m:   f32,
    pub emergency:             ArbiterConfig,
    pub weights:               VehicleWeights,
    pub weather:               WeatherCondition,
    /// Bounded length of the transition log.
    pub history_len:           usize,
    /// Capacity of the command channel.
    pub command_capacity:      usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            minimum_green:         Duration::from_secs(10),
            maximum_green:         Duration::from_secs(60),
            yellow:                Duration::from_secs(3),
            all_red:               Duration::from_secs(2),
            green_pool:            Duration::from_secs(60),
            turn_activation:       3,
            pedestrian_activation: 1,
            walking_speed_mps:     1.2,
            minimum_crossing:      Duration::from_secs(7),
            starvation_threshold:  Duration::from_secs(180),
            fairness_threshold:    Duration::from_secs(120),
            spacing_threshold_m:   10.0,
            emergency:             ArbiterConfig::default(),
            weights:               VehicleWeights::default(),
            weather:               WeatherCondition::Clear,
            history_len:           256,
            command_capacity:      64,
        }
    }
}

fn secs_in(name: &str, value: f64, lo: f64, hi: f64) -> Result<Duration, String> {
    if !(lo..=hi).contains(&value) {
        return Err(format!("{name} must be within [{lo}, {hi}] s, got {value}"));
    }
    Ok(Duration::from_secs_f64(value))
}

fn count_in(name: &str, value: f64, lo: u32, hi: u32) -> Result<u32, String> {
    if value.fract() != 0.0 || value < lo as f64 || value > hi as f64 {
        return Err(format!("{name} must be an integer within [{lo}, {hi}], got {value}"));
    }
    Ok(value as u32)
}

impl ControllerConfig {
    /// Names accepted by [`set_parameter`][Self::set_parameter].
    pub const PARAMETERS: [&'static str; 9] = [
        "minimum_green",
        "maximum_green",
        "yellow_duration",
        "all_red_duration",
        "green_pool",
        "starvation_threshold",
        "fairness_threshold",
        "turn_activation_threshold",
        "pedestrian_activation_threshold",
    ];

    /// Every problem with this configuration.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.minimum_green.is_zero() {
            out.push("minimum_green must be positive".to_string());
        }
        if self.minimum_green > self.maximum_green {
            out.push(format!(
                "minimum_green {:?} exceeds maximum_green {:?}",
                self.minimum_green, self.maximum_green
            ));
        }
        if self.yellow.is_zero() {
            out.push("yellow must be positive; GREEN may never go straight to RED".to_string());
        }
        if self.green_pool.is_zero() {
            out.push("green_pool must be positive".to_string());
        }
        if self.turn_activation == 0 {
            out.push("turn_activation must be at least 1".to_string());
        }
        if self.pedestrian_activation == 0 {
            out.push("pedestrian_activation must be at least 1".to_string());
        }
        if !(self.walking_speed_mps.is_finite() && self.walking_speed_mps > 0.0) {
            out.push("walking_speed_mps must be positive".to_string());
        }
        if !(self.spacing_threshold_m.is_finite() && self.spacing_threshold_m > 0.0) {
            out.push("spacing_threshold_m must be positive".to_string());
        }
        if self.emergency.max_hold.is_zero() {
            out.push("emergency max_hold must be positive".to_string());
        }
        if self.command_capacity == 0 {
            out.push("command_capacity must be at least 1".to_string());
        }
        out
    }

    pub fn validate(&self) -> ControlResult<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ControlError::InvalidConfig(problems.join("; ")))
        }
    }

    /// Apply one named runtime adjustment.  On error `self` is unchanged.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("{name} must be finite"));
        }
        let mut next = self.clone();
        match name {
            "minimum_green"    => next.minimum_green = secs_in(name, value, 1.0, 300.0)?,
            "maximum_green"    => next.maximum_green = secs_in(name, value, 1.0, 600.0)?,
            "yellow_duration"  => next.yellow = secs_in(name, value, 1.0, 10.0)?,
            "all_red_duration" => next.all_red = secs_in(name, value, 0.0, 10.0)?,
            "green_pool"       => next.green_pool = secs_in(name, value, 1.0, 1_200.0)?,
            "starvation_threshold" => {
                next.starvation_threshold = secs_in(name, value, 1.0, 3_600.0)?
            }
            "fairness_threshold" => next.fairness_threshold = secs_in(name, value, 1.0, 3_600.0)?,
            "turn_activation_threshold" => next.turn_activation = count_in(name, value, 1, 100)?,
            "pedestrian_activation_threshold" => {
                next.pedestrian_activation = count_in(name, value, 1, 100)?
            }
            _ => return Err(format!("unknown parameter {name:?}")),
        }
        let problems = next.problems();
        if !problems.is_empty() {
            return Err(problems.join("; "));
        }
        *self = next;
        Ok(())
    }

    pub fn analyzer(&self) -> TrafficAnalyzer {
        TrafficAnalyzer::new(
            AnalyzerConfig {
                fairness_threshold: self.fairness_threshold,
                starvation_threshold: self.starvation_threshold,
                ..AnalyzerConfig::default()
            },
            self.weights.clone(),
        )
    }

    pub fn turn_evaluator(&self) -> TurnEvaluator {
        TurnEvaluator {
            activation_threshold: self.turn_activation,
            minimum_green:        self.minimum_green,
            maximum_green:        self.maximum_green,
            starvation_threshold: self.starvation_threshold,
        }
    }

    pub fn pedestrian_evaluator(&self) -> PedestrianEvaluator {
        PedestrianEvaluator {
            activation_threshold: self.pedestrian_activation,
            walking_speed_mps:    self.walking_speed_mps,
            minimum_crossing:     self.minimum_crossing,
            starvation_threshold: self.starvation_threshold,
        }
    }

    /// Clamp a computed green into `[minimum_green, maximum_green]`.
    #[inline]
    pub fn clamp_green(&self, green: Duration) -> Duration {
        green.max(self.minimum_green).min(self.maximum_green)
    }
}
