//! Vehicle-class multipliers applied per detected unit.

use std::collections::BTreeMap;

use tsc_core::{VehicleClass, VehicleMix};

/// Per-class weight.  A lane's type score is `Σ count(class) · weight(class)`,
/// so one bus plus N cars always outranks N cars alone.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleWeights {
    weights: BTreeMap<VehicleClass, f32>,
    /// Weight of vehicles counted but not classified.
    pub unclassified: f32,
}

impl Default for VehicleWeights {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (VehicleClass::Car,        1.0),
            (VehicleClass::Motorcycle, 0.8),
            (VehicleClass::Bicycle,    0.7),
            (VehicleClass::Truck,      1.5),
            (VehicleClass::Bus,        2.0),
            (VehicleClass::Ambulance,  10.0),
            (VehicleClass::FireTruck,  10.0),
            (VehicleClass::Police,     10.0),
        ]);
        Self { weights, unclassified: 1.0 }
    }
}

impl VehicleWeights {
    /// Every class weighs 1.0.
    pub fn uniform() -> Self {
        Self {
            weights: VehicleClass::ALL.iter().map(|&c| (c, 1.0)).collect(),
            unclassified: 1.0,
        }
    }

    pub fn get(&self, class: VehicleClass) -> f32 {
        self.weights.get(&class).copied().unwrap_or(self.unclassified)
    }

    /// Override one class weight.  Negative or non-finite values are ignored.
    pub fn set(&mut self, class: VehicleClass, weight: f32) {
        if weight.is_finite() && weight >= 0.0 {
            self.weights.insert(class, weight);
        }
    }

    /// Weighted unit count for a lane reporting `vehicle_count` vehicles of
    /// which `mix` were classified.
    pub fn weigh(&self, vehicle_count: u32, mix: &VehicleMix) -> f32 {
        let classified: f32 = mix.iter().map(|(c, n)| n as f32 * self.get(c)).sum();
        let rest = vehicle_count.saturating_sub(mix.total());
        classified + rest as f32 * self.unclassified
    }
}
