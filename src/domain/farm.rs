use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A wind farm with its nameplate capacity and site coordinates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindFarm {
    pub name: String,
    pub capacity_mw: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl WindFarm {
    pub fn new(name: impl Into<String>, capacity_mw: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            capacity_mw,
            latitude,
            longitude,
        }
    }

    /// Clip a generation value to the physically possible range for this farm.
    pub fn clip(&self, generation_mw: f64) -> f64 {
        clip_to_capacity(generation_mw, self.capacity_mw)
    }
}

/// Clip generation into `[0, capacity_mw]`. NaN maps to 0.
pub fn clip_to_capacity(generation_mw: f64, capacity_mw: f64) -> f64 {
    if generation_mw.is_nan() {
        return 0.0;
    }
    generation_mw.clamp(0.0, capacity_mw.max(0.0))
}

/// One Balancing Mechanism unit registered against a farm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BmUnit {
    pub unit_id: String,
    pub unit_capacity_mw: f64,
}

/// Farm name -> ordered BM units. A farm may span several dispatch units.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct BmUnitMap {
    farms: BTreeMap<String, Vec<BmUnit>>,
}

impl BmUnitMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit against a farm. Re-registering the same unit id
    /// replaces its capacity and keeps its position.
    pub fn insert(&mut self, farm_name: impl Into<String>, unit: BmUnit) {
        let units = self.farms.entry(farm_name.into()).or_default();
        match units.iter_mut().find(|u| u.unit_id == unit.unit_id) {
            Some(existing) => *existing = unit,
            None => units.push(unit),
        }
    }

    pub fn units_for(&self, farm_name: &str) -> Option<&[BmUnit]> {
        self.farms.get(farm_name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.farms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.farms.is_empty()
    }
}
