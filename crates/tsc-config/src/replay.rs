//! CSV replay of recorded detection output.
//!
//! # CSV format
//!
//! One row per lane per tick.  Lanes are referenced by name and resolved
//! against the intersection layout.
//!
//! ```csv
//! tick,lane,vehicle_count,car,truck,bus,motorcycle,bicycle,pedestrians,emergency,positions
//! 0,north_1,12,10,1,1,0,0,0,,4.5;11.0;17.2
//! 0,east_1,3,3,0,0,0,0,0,,
//! 1,north_1,12,10,1,1,0,0,0,ambulance,4.5;11.0
//! ```
//!
//! | Column       | Meaning                                                   |
//! |--------------|-----------------------------------------------------------|
//! | `emergency`  | empty, or a vehicle class (`ambulance`, `fire_truck`, …)  |
//! | `positions`  | `;`-separated distances from the stop line (m); may be empty |
//!
//! Class columns may be left empty, which reads as zero.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;
use tsc_core::{LaneObservation, ObservationFrame, Tick, VehicleClass, VehicleMix};
use tsc_phase::IntersectionLayout;

use crate::{ConfigError, ConfigResult};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReplayRecord {
    tick:          u64,
    lane:          String,
    vehicle_count: u32,
    #[serde(default)]
    car:           Option<u32>,
    #[serde(default)]
    truck:         Option<u32>,
    #[serde(default)]
    bus:           Option<u32>,
    #[serde(default)]
    motorcycle:    Option<u32>,
    #[serde(default)]
    bicycle:       Option<u32>,
    #[serde(default)]
    pedestrians:   Option<u32>,
    #[serde(default)]
    emergency:     Option<String>,
    #[serde(default)]
    positions:     Option<String>,
}

// ── ReplayFeed ────────────────────────────────────────────────────────────────

/// Recorded frames, one per tick that has rows.
#[derive(Clone, Debug, Default)]
pub struct ReplayFeed {
    frames: BTreeMap<Tick, ObservationFrame>,
}

impl ReplayFeed {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame recorded for exactly `tick`.
    pub fn frame_at(&self, tick: Tick) -> Option<&ObservationFrame> {
        self.frames.get(&tick)
    }

    /// Last tick with a recorded frame.
    pub fn last_tick(&self) -> Option<Tick> {
        self.frames.keys().next_back().copied()
    }

    /// Frames in tick order.
    pub fn frames(&self) -> impl Iterator<Item = &ObservationFrame> {
        self.frames.values()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a replay file for `layout`.
pub fn load_replay_csv(path: &Path, layout: &IntersectionLayout) -> ConfigResult<ReplayFeed> {
    let file = std::fs::File::open(path)?;
    load_replay_reader(file, layout)
}

/// Like [`load_replay_csv`] but accepts any `Read` source.
///
/// # Errors
///
/// [`ConfigError::Replay`] for the first row naming an unknown lane or
/// holding an unparsable class or position; [`ConfigError::Csv`] for
/// malformed CSV.
pub fn load_replay_reader<R: Read>(reader: R, layout: &IntersectionLayout) -> ConfigResult<ReplayFeed> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut frames: BTreeMap<Tick, ObservationFrame> = BTreeMap::new();

    for (i, result) in csv_reader.deserialize::<ReplayRecord>().enumerate() {
        // Header is row 1.
        let row_no = i + 2;
        let row = result?;
        let obs = observation(row_no, &row, layout)?;
        let tick = Tick(row.tick);
        let frame = frames.entry(tick).or_insert_with(|| ObservationFrame::new(tick));
        if frame.get(obs.lane).is_some() {
            return Err(ConfigError::Replay {
                row: row_no,
                message: format!("lane {:?} appears twice at {tick}", row.lane),
            });
        }
        frame.push(obs);
    }

    debug!(intersection = %layout.id, frames = frames.len(), "replay loaded");
    Ok(ReplayFeed { frames })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn observation(row_no: usize, r: &ReplayRecord, layout: &IntersectionLayout) -> ConfigResult<LaneObservation> {
    let err = |message: String| ConfigError::Replay { row: row_no, message };

    let lane = layout
        .lane_by_name(r.lane.trim())
        .ok_or_else(|| err(format!("unknown lane {:?}", r.lane)))?;

    let mut mix = VehicleMix::new();
    for (class, n) in [
        (VehicleClass::Car, r.car),
        (VehicleClass::Truck, r.truck),
        (VehicleClass::Bus, r.bus),
        (VehicleClass::Motorcycle, r.motorcycle),
        (VehicleClass::Bicycle, r.bicycle),
    ] {
        if let Some(n) = n.filter(|&n| n > 0) {
            mix.add(class, n);
        }
    }

    let mut obs = LaneObservation::new(lane.id, r.vehicle_count)
        .with_types(mix)
        .with_pedestrians(r.pedestrians.unwrap_or(0));

    if let Some(class) = r.emergency.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let class: VehicleClass = class.parse().map_err(|e| err(format!("{e}")))?;
        if !class.is_emergency() {
            return Err(err(format!("{class} is not an emergency vehicle class")));
        }
        obs = obs.with_emergency(class);
    }

    if let Some(list) = r.positions.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let positions = list
            .split(';')
            .map(|p| {
                p.trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| err(format!("bad position {p:?}")))
            })
            .collect::<ConfigResult<Vec<f32>>>()?;
        obs = obs.with_positions(positions);
    }

    Ok(obs)
}
