//! Green-wave offset computation across corridors.
//!
//! The coordinator never touches a controller directly.  Members hand it
//! [`MemberReport`]s; it answers by writing each member's
//! [`OffsetCell`].  Controllers apply a changed offset only at their next
//! cycle start, so a recompute never reorders or shortens a running phase.
//!
//! # Offsets
//!
//! Corridors are processed highest priority first.  Within a corridor the
//! first active member keeps its offset (0 unless a higher-priority corridor
//! already fixed it) and each later active member gets
//!
//! ```text
//! offset[i] = (offset[prev] + travel_time(prev → i)) mod cycle_time[i]
//! ```
//!
//! Degraded members are skipped; the travel time across them accumulates
//! into the next active member's offset.
//!
//! # Recompute policy
//!
//! Offsets are recomputed when membership changes (a member degrades or
//! comes back), or when some member's cycle time drifted by more than
//! `cycle_tolerance` from the value last used and at least `min_reoptimize`
//! has passed since the previous recompute.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use tsc_control::OffsetCell;
use tsc_core::IntersectionId;

use crate::{IdMap, NetworkError, NetworkResult, NetworkTopology};

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinatorConfig {
    /// When `false` the coordinator still tracks health and metrics but
    /// writes no offsets.
    pub enabled:          bool,
    /// Progression speed used for links without a configured travel time.
    pub target_speed_mps: f32,
    /// How often members report and the coordinator runs.
    pub update_interval:  Duration,
    pub cycle_tolerance:  Duration,
    pub min_reoptimize:   Duration,
    /// Silence after which a member is degraded out of its corridors.
    pub stale_after:      Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled:          true,
            target_speed_mps: 13.9,
            update_interval:  Duration::from_secs(5),
            cycle_tolerance:  Duration::from_secs(5),
            min_reoptimize:   Duration::from_secs(30),
            stale_after:      Duration::from_secs(30),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> NetworkResult<()> {
        let mut problems = Vec::new();
        if !(self.target_speed_mps.is_finite() && self.target_speed_mps > 0.0) {
            problems.push(format!("target_speed_mps must be positive, got {}", self.target_speed_mps));
        }
        if self.update_interval.is_zero() {
            problems.push("update_interval must be positive".to_string());
        }
        if self.stale_after < self.update_interval {
            problems.push("stale_after must be at least update_interval".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(NetworkError::InvalidConfig(problems.join("; ")))
        }
    }
}

// ── Member state ──────────────────────────────────────────────────────────────

/// What a member tells the coordinator each update interval.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberReport {
    pub id:             IntersectionId,
    /// Network control time the report was taken.
    pub at:             Duration,
    /// Length of the member's latest adaptive cycle; zero before its first.
    pub cycle_time:     Duration,
    pub discharged:     u64,
    pub throughput_vph: f32,
    pub safety_faults:  u64,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MemberHealth {
    Active,
    /// Stopped reporting; removed from corridors until it reports again.
    Degraded,
}

#[derive(Debug)]
struct Member {
    cell:       Arc<OffsetCell>,
    health:     MemberHealth,
    last:       Option<MemberReport>,
    /// Cycle time the current offsets were computed with.
    cycle_used: Option<Duration>,
}

impl Member {
    fn cycle(&self) -> Option<Duration> {
        if self.health != MemberHealth::Active {
            return None;
        }
        self.last.as_ref().map(|r| r.cycle_time).filter(|c| !c.is_zero())
    }
}

/// Offsets one corridor produced in the latest recompute.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorridorOffsets {
    pub corridor: String,
    pub offsets:  Vec<(IntersectionId, Duration)>,
    /// Members left out because they were degraded or had no cycle yet.
    pub skipped:  Vec<IntersectionId>,
}

/// Result of one [`NetworkCoordinator::update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoordinationUpdate {
    pub recomputed: bool,
    pub degraded:   Vec<IntersectionId>,
    pub restored:   Vec<IntersectionId>,
}

/// Network-wide metrics.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkMetrics {
    pub average_travel_time:  Duration,
    pub stops_per_vehicle:    f32,
    /// 0..=1; 1 means probe vehicles never stopped.
    pub coordination_quality: f32,
    pub total_throughput:     u64,
    pub throughput_vph:       f32,
    pub active_members:       usize,
    pub degraded_members:     usize,
    pub recomputations:       u64,
}

#[derive(Clone, Debug, Default)]
struct TripStats {
    trips:        u64,
    total_travel: Duration,
    total_stops:  u64,
}

// ── NetworkCoordinator ────────────────────────────────────────────────────────

pub struct NetworkCoordinator {
    topology:       NetworkTopology,
    config:         CoordinatorConfig,
    members:        IdMap<IntersectionId, Member>,
    offsets:        BTreeMap<IntersectionId, Duration>,
    plans:          Vec<CorridorOffsets>,
    last_update:    Option<Duration>,
    last_optimized: Option<Duration>,
    membership_changed: bool,
    trips:          TripStats,
    recomputations: u64,
}

impl NetworkCoordinator {
    pub fn new(topology: NetworkTopology, config: CoordinatorConfig) -> NetworkResult<Self> {
        config.validate()?;
        Ok(Self {
            topology,
            config,
            members: IdMap::default(),
            offsets: BTreeMap::new(),
            plans: Vec::new(),
            last_update: None,
            last_optimized: None,
            membership_changed: false,
            trips: TripStats::default(),
            recomputations: 0,
        })
    }

    pub fn topology(&self) -> &NetworkTopology {
        &self.topology
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Attach a member's offset cell.
    ///
    /// # Errors
    ///
    /// The id must be part of the topology and not registered yet.
    pub fn register(&mut self, id: IntersectionId, cell: Arc<OffsetCell>) -> NetworkResult<()> {
        if !self.topology.contains(id) {
            return Err(NetworkError::UnknownIntersection(id));
        }
        if self.members.contains_key(&id) {
            return Err(NetworkError::DuplicateIntersection(id));
        }
        self.members.insert(id, Member { cell, health: MemberHealth::Active, last: None, cycle_used: None });
        self.membership_changed = true;
        Ok(())
    }

    pub fn health(&self, id: IntersectionId) -> Option<MemberHealth> {
        self.members.get(&id).map(|m| m.health)
    }

    /// Degraded members, in id order.
    pub fn degraded(&self) -> Vec<IntersectionId> {
        let mut out: Vec<_> = self
            .members
            .iter()
            .filter(|(_, m)| m.health == MemberHealth::Degraded)
            .map(|(&id, _)| id)
            .collect();
        out.sort();
        out
    }

    /// Offsets from the latest recompute.
    pub fn offsets(&self) -> &BTreeMap<IntersectionId, Duration> {
        &self.offsets
    }

    pub fn offset(&self, id: IntersectionId) -> Option<Duration> {
        self.offsets.get(&id).copied()
    }

    pub fn corridor_offsets(&self) -> &[CorridorOffsets] {
        &self.plans
    }

    /// Whether `update` should run at `now`.
    pub fn is_due(&self, now: Duration) -> bool {
        self.last_update
            .is_none_or(|t| now.saturating_sub(t) >= self.config.update_interval)
    }

    /// Accept one member's report.  Reports from unknown ids are ignored.
    pub fn report(&mut self, report: MemberReport) {
        let Some(m) = self.members.get_mut(&report.id) else {
            debug!(id = %report.id, "report from unregistered intersection ignored");
            return;
        };
        m.last = Some(report);
    }

    /// Health check, then recompute offsets if the policy calls for it.
    pub fn update(&mut self, now: Duration) -> CoordinationUpdate {
        self.last_update = Some(now);
        let mut out = CoordinationUpdate::default();

        for (&id, m) in self.members.iter_mut() {
            let seen = m.last.as_ref().map(|r| r.at);
            let stale = seen.is_none_or(|t| now.saturating_sub(t) > self.config.stale_after);
            match (m.health, stale) {
                (MemberHealth::Active, true) if seen.is_some() || now >= self.config.stale_after => {
                    warn!(%id, "intersection stopped reporting; removed from coordination");
                    m.health = MemberHealth::Degraded;
                    m.cell.clear();
                    out.degraded.push(id);
                }
                (MemberHealth::Degraded, false) => {
                    info!(%id, "intersection reporting again; restored to coordination");
                    m.health = MemberHealth::Active;
                    out.restored.push(id);
                }
                _ => {}
            }
        }
        out.degraded.sort();
        out.restored.sort();
        if !out.degraded.is_empty() || !out.restored.is_empty() {
            self.membership_changed = true;
        }

        if !self.config.enabled {
            return out;
        }

        // A member's first cycle counts as a membership change.
        let first_cycle = self.members.values().any(|m| m.cycle().is_some() && m.cycle_used.is_none());
        let drifted = self.members.values().any(|m| match (m.cycle(), m.cycle_used) {
            (Some(c), Some(used)) => c.abs_diff(used) > self.config.cycle_tolerance,
            _ => false,
        });
        let interval_ok = self
            .last_optimized
            .is_none_or(|t| now.saturating_sub(t) >= self.config.min_reoptimize);

        if self.membership_changed || first_cycle || (drifted && interval_ok) {
            self.recompute(now);
            out.recomputed = true;
        }
        out
    }

    /// Recompute every corridor's offsets now and write them out.
    pub fn recompute(&mut self, now: Duration) {
        let mut corridors: Vec<_> = self.topology.corridors.iter().collect();
        corridors.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut offsets: BTreeMap<IntersectionId, Duration> = BTreeMap::new();
        let mut plans = Vec::with_capacity(corridors.len());
        for corridor in corridors {
            let mut plan = CorridorOffsets {
                corridor: corridor.name.clone(),
                offsets: Vec::new(),
                skipped: Vec::new(),
            };
            let mut prev: Option<Duration> = None;
            let mut carried = Duration::ZERO;
            for (i, &id) in corridor.members.iter().enumerate() {
                if i > 0 {
                    let from = corridor.members[i - 1];
                    if let Some(link) = self.topology.link_between(from, id) {
                        carried += self.topology.travel_time(link, self.config.target_speed_mps);
                    }
                }
                let Some(cycle) = self.members.get(&id).and_then(Member::cycle) else {
                    plan.skipped.push(id);
                    continue;
                };
                let offset = match (offsets.get(&id), prev) {
                    (Some(&fixed), _) => fixed,
                    (None, None) => Duration::ZERO,
                    (None, Some(p)) => rem(p + carried, cycle),
                };
                offsets.entry(id).or_insert(offset);
                plan.offsets.push((id, offset));
                prev = Some(offset);
                carried = Duration::ZERO;
            }
            if !plan.skipped.is_empty() {
                debug!(corridor = %plan.corridor, skipped = ?plan.skipped, "corridor members skipped");
            }
            plans.push(plan);
        }

        for (&id, m) in self.members.iter_mut() {
            match offsets.get(&id) {
                Some(&o) if m.health == MemberHealth::Active => m.cell.set(o),
                _ => m.cell.clear(),
            }
            m.cycle_used = m.cycle();
        }

        self.recomputations += 1;
        self.last_optimized = Some(now);
        self.membership_changed = false;
        info!(
            members = offsets.len(),
            corridors = plans.len(),
            recomputations = self.recomputations,
            "coordination offsets recomputed"
        );
        self.offsets = offsets;
        self.plans = plans;
    }

    // ── Metrics ───────────────────────────────────────────────────────────

    /// Record one probe vehicle's trip through the network.
    pub fn record_trip(&mut self, travel_time: Duration, stops: u32) {
        self.trips.trips += 1;
        self.trips.total_travel += travel_time;
        self.trips.total_stops += stops as u64;
    }

    pub fn reset_metrics(&mut self) {
        self.trips = TripStats::default();
    }

    pub fn metrics(&self) -> NetworkMetrics {
        let t = &self.trips;
        let (average_travel_time, stops_per_vehicle) = if t.trips > 0 {
            (mean_duration(t.total_travel, t.trips), t.total_stops as f32 / t.trips as f32)
        } else {
            (Duration::ZERO, 0.0)
        };
        let coordination_quality = if t.trips == 0 {
            0.0
        } else if stops_per_vehicle <= 1.0 {
            1.0 - stops_per_vehicle / 2.0
        } else {
            (1.0 - stops_per_vehicle / 4.0).max(0.0)
        };

        let reports = self.members.values().filter_map(|m| m.last.as_ref());
        let (total_throughput, throughput_vph) =
            reports.fold((0u64, 0.0f32), |(n, v), r| (n + r.discharged, v + r.throughput_vph));
        let degraded_members =
            self.members.values().filter(|m| m.health == MemberHealth::Degraded).count();

        NetworkMetrics {
            average_travel_time,
            stops_per_vehicle,
            coordination_quality,
            total_throughput,
            throughput_vph,
            active_members: self.members.len() - degraded_members,
            degraded_members,
            recomputations: self.recomputations,
        }
    }
}

/// `total / n`, zero for `n == 0`.
pub(crate) fn mean_duration(total: Duration, n: u64) -> Duration {
    if n == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(total.as_secs_f64() / n as f64)
}

fn rem(d: Duration, cycle: Duration) -> Duration {
    let c = cycle.as_nanos();
    if c == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((d.as_nanos() % c) as u64)
}
