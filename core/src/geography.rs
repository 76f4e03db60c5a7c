//! Geography definitions and marginal targets.
//!
//! Municipalities are the calibration geography. Each one owns a set of
//! zones and optionally belongs to a coarser region whose totals are
//! shared by all of its municipalities.

use crate::{
    error::{SynPopError, SynPopResult},
    types::{GeoId, RegionId, ZoneId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Municipality {
    pub id:     GeoId,
    #[serde(default)]
    pub region: Option<RegionId>,
    pub zones:  Vec<ZoneId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geography {
    municipalities: BTreeMap<GeoId, Municipality>,
}

impl Geography {
    pub fn new(municipalities: Vec<Municipality>) -> Self {
        Self {
            municipalities: municipalities.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn municipality(&self, geo: GeoId) -> SynPopResult<&Municipality> {
        self.municipalities
            .get(&geo)
            .ok_or(SynPopError::UnknownGeography { geo })
    }

    pub fn municipality_ids(&self) -> impl Iterator<Item = GeoId> + '_ {
        self.municipalities.keys().copied()
    }

    pub fn zones_of(&self, geo: GeoId) -> SynPopResult<&[ZoneId]> {
        Ok(&self.municipality(geo)?.zones)
    }

    /// All regions, each with its member municipalities in id order.
    pub fn regions(&self) -> BTreeMap<RegionId, Vec<GeoId>> {
        let mut out: BTreeMap<RegionId, Vec<GeoId>> = BTreeMap::new();
        for m in self.municipalities.values() {
            if let Some(r) = m.region {
                out.entry(r).or_default().push(m.id);
            }
        }
        out
    }

    /// The municipality a zone belongs to.
    pub fn municipality_of_zone(&self, zone: ZoneId) -> Option<GeoId> {
        self.municipalities
            .values()
            .find(|m| m.zones.contains(&zone))
            .map(|m| m.id)
    }
}

/// Attribute name → target count for one geography.
pub type AttributeTargets = BTreeMap<String, f64>;

/// Marginal targets for every geography of one level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginalTable {
    pub targets: BTreeMap<u32, AttributeTargets>,
}

impl MarginalTable {
    pub fn get(&self, id: u32) -> Option<&AttributeTargets> {
        self.targets.get(&id)
    }

    pub fn insert(&mut self, id: u32, targets: AttributeTargets) {
        self.targets.insert(id, targets);
    }
}

/// Municipality targets plus optional region targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Marginals {
    pub municipality: MarginalTable,
    #[serde(default)]
    pub region:       MarginalTable,
}
