//! Lane priority scoring and ratio normalization.

use std::time::Duration;

use tracing::warn;
use tsc_core::{LaneId, LaneObservation, VehicleMix};

use crate::{Conditions, QueueMetrics, VehicleWeights};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Score coefficients and fairness thresholds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalyzerConfig {
    /// Score added per metre of queue.
    pub queue_factor:         f32,
    /// Score added per second of accumulated wait.
    pub wait_factor:          f32,
    /// Time since last green after which the fairness term starts growing.
    pub fairness_threshold:   Duration,
    /// Fairness score added per second beyond `fairness_threshold`.
    pub fairness_boost:       f32,
    /// Accumulated wait at which a lane is guaranteed service next cycle.
    pub starvation_threshold: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            queue_factor:         0.2,
            wait_factor:          0.1,
            fairness_threshold:   Duration::from_secs(120),
            fairness_boost:       0.5,
            starvation_threshold: Duration::from_secs(180),
        }
    }
}

// ── LaneData ──────────────────────────────────────────────────────────────────

/// Everything the allocator knows about one lane for one cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaneData {
    pub lane:             LaneId,
    pub vehicle_count:    u32,
    pub vehicle_types:    VehicleMix,
    pub queue:            QueueMetrics,
    pub pedestrian_count: u32,
    /// Time the lane has held demand while not green; reset on green.
    pub wait_time:        Duration,
    /// Time since the lane's movement last displayed green.
    pub since_green:      Duration,
    /// `false` when the detection feed sent nothing usable for this lane.
    pub valid:            bool,
}

impl LaneData {
    pub fn from_observation(
        obs: &LaneObservation,
        queue: QueueMetrics,
        wait_time: Duration,
        since_green: Duration,
    ) -> Self {
        Self {
            lane:             obs.lane,
            vehicle_count:    obs.vehicle_count,
            vehicle_types:    obs.vehicle_types.clone(),
            queue,
            pedestrian_count: obs.pedestrian_count,
            wait_time,
            since_green,
            valid:            obs.is_valid(),
        }
    }

    /// Placeholder for a lane the feed did not report.
    pub fn missing(lane: LaneId, wait_time: Duration, since_green: Duration) -> Self {
        Self { lane, wait_time, since_green, valid: false, ..Self::default() }
    }

    #[inline]
    pub fn has_demand(&self) -> bool {
        self.vehicle_count > 0 || self.pedestrian_count > 0
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneScore {
    pub lane:     LaneId,
    /// Raw priority score including the fairness term.
    pub score:    f32,
    /// Share of the green pool; sums to 1 across contending lanes.
    pub ratio:    f32,
    /// Wait exceeded the starvation threshold.
    pub starved:  bool,
    /// No usable data; the allocator gives this lane its minimum green.
    pub fallback: bool,
}

/// Result of one analysis pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    pub scores:     Vec<LaneScore>,
    /// Green time available for distribution after condition scaling.
    pub green_pool: Duration,
}

impl Analysis {
    pub fn get(&self, lane: LaneId) -> Option<&LaneScore> {
        self.scores.iter().find(|s| s.lane == lane)
    }
}

// ── TrafficAnalyzer ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct TrafficAnalyzer {
    pub config:  AnalyzerConfig,
    pub weights: VehicleWeights,
}

impl TrafficAnalyzer {
    pub fn new(config: AnalyzerConfig, weights: VehicleWeights) -> Self {
        Self { config, weights }
    }

    /// Fairness term: zero until `fairness_threshold`, then linear in time.
    pub fn fairness(&self, since_green: Duration) -> f32 {
        let over = since_green.saturating_sub(self.config.fairness_threshold);
        over.as_secs_f32() * self.config.fairness_boost
    }

    pub fn is_starved(&self, lane: &LaneData) -> bool {
        lane.has_demand() && lane.wait_time >= self.config.starvation_threshold
    }

    /// Priority score of one lane.
    pub fn score(&self, lane: &LaneData) -> f32 {
        let units = self.weights.weigh(lane.vehicle_count, &lane.vehicle_types);
        units
            + lane.queue.length_m * self.config.queue_factor
            + lane.wait_time.as_secs_f32() * self.config.wait_factor
            + self.fairness(lane.since_green)
    }

    /// Score every lane and normalize scores into pool ratios.
    ///
    /// Invalid lanes are excluded from normalization and flagged `fallback`.
    /// When every contending lane scores zero, they share the pool equally.
    pub fn analyze(&self, lanes: &[LaneData], base_pool: Duration, conditions: &Conditions) -> Analysis {
        let mut scores: Vec<LaneScore> = lanes
            .iter()
            .map(|lane| {
                let score = if lane.valid { self.score(lane) } else { 0.0 };
                let fallback = !lane.valid || !score.is_finite() || score < 0.0;
                if fallback {
                    warn!(lane = %lane.lane, "missing or invalid lane data, using minimum allocation");
                }
                LaneScore {
                    lane: lane.lane,
                    score: if fallback { 0.0 } else { score },
                    ratio: 0.0,
                    starved: self.is_starved(lane),
                    fallback,
                }
            })
            .collect();

        let contenders = scores.iter().filter(|s| !s.fallback).count();
        let total: f32 = scores.iter().filter(|s| !s.fallback).map(|s| s.score).sum();
        for s in scores.iter_mut().filter(|s| !s.fallback) {
            s.ratio = if total > 0.0 {
                s.score / total
            } else {
                1.0 / contenders as f32
            };
        }

        let multiplier = conditions.adjustment().green_multiplier;
        Analysis {
            scores,
            green_pool: base_pool.mul_f32(multiplier.max(0.0)),
        }
    }
}
