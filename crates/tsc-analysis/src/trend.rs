//! Rolling congestion trend and discharge throughput per lane.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tsc_core::LaneId;

use crate::SATURATION_FLOW_VPH;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CongestionTrend {
    Improving,
    #[default]
    Stable,
    Worsening,
}

// ── TrendTracker ──────────────────────────────────────────────────────────────

/// Classifies each lane's score history by comparing the recent half of a
/// rolling window against the older half.
#[derive(Clone, Debug)]
pub struct TrendTracker {
    window:    usize,
    threshold: f32,
    history:   BTreeMap<LaneId, VecDeque<f32>>,
}

impl Default for TrendTracker {
    fn default() -> Self {
        Self::new(10, 0.1)
    }
}

impl TrendTracker {
    const MIN_SAMPLES: usize = 3;

    pub fn new(window: usize, threshold: f32) -> Self {
        Self { window: window.max(Self::MIN_SAMPLES), threshold, history: BTreeMap::new() }
    }

    /// Record a sample and return the lane's updated trend.
    pub fn record(&mut self, lane: LaneId, value: f32) -> CongestionTrend {
        let samples = self.history.entry(lane).or_default();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(value);
        self.trend(lane)
    }

    pub fn trend(&self, lane: LaneId) -> CongestionTrend {
        let Some(samples) = self.history.get(&lane) else {
            return CongestionTrend::Stable;
        };
        let n = samples.len();
        if n < Self::MIN_SAMPLES {
            return CongestionTrend::Stable;
        }
        let mid = n / 2;
        let older: f32 = samples.iter().take(mid).sum::<f32>() / mid as f32;
        let recent: f32 = samples.iter().skip(mid).sum::<f32>() / (n - mid) as f32;
        if older <= 0.0 {
            return CongestionTrend::Stable;
        }
        let change = (recent - older) / older;
        if change <= -self.threshold {
            CongestionTrend::Improving
        } else if change >= self.threshold {
            CongestionTrend::Worsening
        } else {
            CongestionTrend::Stable
        }
    }

    pub fn reset(&mut self, lane: LaneId) {
        self.history.remove(&lane);
    }
}

// ── ThroughputTracker ─────────────────────────────────────────────────────────

/// Vehicles discharged per lane over a sliding window of control time.
#[derive(Clone, Debug)]
pub struct ThroughputTracker {
    window:  Duration,
    /// `(time, vehicles)` discharge records per lane, oldest first.
    records: BTreeMap<LaneId, VecDeque<(Duration, u32)>>,
}

impl Default for ThroughputTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600))
    }
}

impl ThroughputTracker {
    pub fn new(window: Duration) -> Self {
        Self { window, records: BTreeMap::new() }
    }

    /// Upper bound on vehicles one lane can discharge in `green`.
    pub fn saturation_limit(green: Duration) -> u32 {
        (green.as_secs_f32() * SATURATION_FLOW_VPH / 3_600.0).floor() as u32
    }

    /// Record `vehicles` cleared from `lane` at control time `now`.
    pub fn record(&mut self, lane: LaneId, now: Duration, vehicles: u32) {
        self.prune(now);
        if vehicles == 0 {
            return;
        }
        self.records.entry(lane).or_default().push_back((now, vehicles));
    }

    /// Drop records older than the window ending at `now`.
    pub fn prune(&mut self, now: Duration) {
        let cutoff = now.saturating_sub(self.window);
        for q in self.records.values_mut() {
            while q.front().is_some_and(|&(t, _)| t < cutoff) {
                q.pop_front();
            }
        }
    }

    /// Vehicles per hour for `lane` over the window ending at `now`.
    pub fn throughput(&self, lane: LaneId, now: Duration) -> f32 {
        let span = self.window.min(now).as_secs_f32();
        if span <= 0.0 {
            return 0.0;
        }
        let cutoff = now.saturating_sub(self.window);
        let total: u32 = self
            .records
            .get(&lane)
            .map(|q| q.iter().filter(|&&(t, _)| t >= cutoff).map(|&(_, n)| n).sum())
            .unwrap_or(0);
        total as f32 / span * 3_600.0
    }

    /// Vehicles per hour summed across all lanes.
    pub fn total_throughput(&self, now: Duration) -> f32 {
        self.records.keys().map(|&l| self.throughput(l, now)).sum()
    }

    /// Vehicles discharged across all lanes inside the current window.
    pub fn total_vehicles(&self) -> u64 {
        self.records.values().flatten().map(|&(_, n)| n as u64).sum()
    }
}
