//! Vehicle classes reported by the detection feed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::TscError;

/// Class of a detected road user.
///
/// The ordering is stable and used for deterministic iteration over
/// [`VehicleMix`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bicycle,
    Truck,
    Bus,
    Ambulance,
    FireTruck,
    Police,
}

impl VehicleClass {
    /// All classes, in declaration order.
    pub const ALL: [VehicleClass; 8] = [
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Bicycle,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Ambulance,
        VehicleClass::FireTruck,
        VehicleClass::Police,
    ];

    #[inline]
    pub fn is_emergency(self) -> bool {
        self.priority_level().is_some()
    }

    /// Preemption priority; lower is more urgent.  `None` for ordinary traffic.
    pub fn priority_level(self) -> Option<u8> {
        match self {
            VehicleClass::Ambulance => Some(1),
            VehicleClass::FireTruck => Some(2),
            VehicleClass::Police    => Some(3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Car        => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bicycle    => "bicycle",
            VehicleClass::Truck      => "truck",
            VehicleClass::Bus        => "bus",
            VehicleClass::Ambulance  => "ambulance",
            VehicleClass::FireTruck  => "fire_truck",
            VehicleClass::Police     => "police",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = TscError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "car"                      => Ok(VehicleClass::Car),
            "motorcycle" | "motorbike" => Ok(VehicleClass::Motorcycle),
            "bicycle" | "bike"         => Ok(VehicleClass::Bicycle),
            "truck"                    => Ok(VehicleClass::Truck),
            "bus"                      => Ok(VehicleClass::Bus),
            "ambulance"                => Ok(VehicleClass::Ambulance),
            "fire_truck" | "firetruck" => Ok(VehicleClass::FireTruck),
            "police"                   => Ok(VehicleClass::Police),
            _ => Err(TscError::UnknownVehicleClass(s.to_string())),
        }
    }
}

// ── VehicleMix ────────────────────────────────────────────────────────────────

/// Per-class vehicle counts for one lane.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VehicleMix(BTreeMap<VehicleClass, u32>);

impl VehicleMix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` vehicles of `class`.
    pub fn add(&mut self, class: VehicleClass, n: u32) {
        if n > 0 {
            *self.0.entry(class).or_insert(0) += n;
        }
    }

    /// Builder-style `add`.
    pub fn with(mut self, class: VehicleClass, n: u32) -> Self {
        self.add(class, n);
        self
    }

    pub fn count(&self, class: VehicleClass) -> u32 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(class, count)` pairs in class order.
    pub fn iter(&self) -> impl Iterator<Item = (VehicleClass, u32)> + '_ {
        self.0.iter().map(|(&c, &n)| (c, n))
    }

    /// The most urgent emergency class present, if any.
    pub fn most_urgent_emergency(&self) -> Option<VehicleClass> {
        self.iter()
            .filter_map(|(c, _)| c.priority_level().map(|p| (p, c)))
            .min()
            .map(|(_, c)| c)
    }
}

impl FromIterator<(VehicleClass, u32)> for VehicleMix {
    fn from_iter<I: IntoIterator<Item = (VehicleClass, u32)>>(iter: I) -> Self {
        let mut mix = VehicleMix::new();
        for (c, n) in iter {
            mix.add(c, n);
        }
        mix
    }
}
