//! Spatial queue estimation from ordered vehicle positions.

use std::time::Duration;

/// Saturation flow used for discharge predictions (vehicles / hour / lane).
pub const SATURATION_FLOW_VPH: f32 = 1_800.0;

/// Queue extent for one lane at one tick.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueMetrics {
    /// Distance from head to tail (m).  Zero with fewer than two queued vehicles.
    pub length_m:      f32,
    /// Vehicles in the contiguous queue starting at the stop line.
    pub vehicle_count: u32,
    /// Vehicles per metre; zero when `length_m` is zero.
    pub density:       f32,
    pub head_m:        f32,
    pub tail_m:        f32,
    /// `length_m >= capacity_m` for a lane with a known capacity.
    pub spillback:     bool,
}

/// Walks vehicle positions outward from the stop line and measures the
/// contiguous queue.
#[derive(Copy, Clone, Debug)]
pub struct QueueEstimator {
    /// Largest gap (m) between consecutive vehicles that still counts as queued.
    pub spacing_threshold_m: f32,
}

impl Default for QueueEstimator {
    fn default() -> Self {
        Self { spacing_threshold_m: 10.0 }
    }
}

impl QueueEstimator {
    pub fn new(spacing_threshold_m: f32) -> Self {
        Self { spacing_threshold_m }
    }

    /// Estimate the queue described by `positions` (metres from the stop line).
    ///
    /// Positions are expected nearest-first; an unsorted slice is sorted on a
    /// copy.  A `capacity_m` of zero disables spillback detection.
    pub fn estimate(&self, positions: &[f32], capacity_m: f32) -> QueueMetrics {
        let sorted: Vec<f32>;
        let ordered: &[f32] = if positions.windows(2).all(|w| w[0] <= w[1]) {
            positions
        } else {
            let mut v = positions.to_vec();
            v.sort_by(f32::total_cmp);
            sorted = v;
            &sorted
        };

        let Some(&head) = ordered.first() else {
            return QueueMetrics::default();
        };

        let mut tail = head;
        let mut count = 1u32;
        for &pos in &ordered[1..] {
            if pos - tail >= self.spacing_threshold_m {
                break;
            }
            tail = pos;
            count += 1;
        }

        let length_m = if count < 2 { 0.0 } else { tail - head };
        let density = if length_m > 0.0 { count as f32 / length_m } else { 0.0 };

        QueueMetrics {
            length_m,
            vehicle_count: count,
            density,
            head_m: head,
            tail_m: tail,
            spillback: capacity_m > 0.0 && length_m >= capacity_m,
        }
    }

    /// Time to discharge the whole queue at saturation flow.
    pub fn clearance_time(&self, metrics: &QueueMetrics) -> Duration {
        let per_second = SATURATION_FLOW_VPH / 3_600.0;
        Duration::from_secs_f32(metrics.vehicle_count as f32 / per_second)
    }
}
