//! Calibrated weight vectors.
//!
//! One nonnegative weight per micro-data record and geography. The solver
//! mutates the live vectors and keeps a snapshot of the lowest-error
//! iteration; the snapshot is what calibration hands on to synthesis.

use crate::{
    error::{SynPopError, SynPopResult},
    types::GeoId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub geography: GeoId,
    pub weights:   Vec<f64>,
}

impl WeightVector {
    pub fn ones(geography: GeoId, len: usize) -> Self {
        Self { geography, weights: vec![1.0; len] }
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Weight vectors for several geographies over the same records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    by_geo: BTreeMap<GeoId, WeightVector>,
}

impl WeightTable {
    pub fn insert(&mut self, vector: WeightVector) {
        self.by_geo.insert(vector.geography, vector);
    }

    pub fn get(&self, geo: GeoId) -> SynPopResult<&WeightVector> {
        self.by_geo.get(&geo).ok_or(SynPopError::UnknownGeography { geo })
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightVector> {
        self.by_geo.values()
    }

    pub fn len(&self) -> usize {
        self.by_geo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_geo.is_empty()
    }

    pub fn merge(&mut self, other: WeightTable) {
        self.by_geo.extend(other.by_geo);
    }
}

/// Lowest-error snapshot seen so far.
#[derive(Debug, Clone)]
pub struct BestWeights {
    pub error:     f64,
    pub iteration: u32,
    pub weights:   Vec<Vec<f64>>,
}

impl BestWeights {
    pub fn new() -> Self {
        Self { error: f64::INFINITY, iteration: 0, weights: Vec::new() }
    }

    /// Copy `live` into the snapshot if `error` beats the best so far.
    pub fn offer(&mut self, iteration: u32, error: f64, live: &[Vec<f64>]) -> bool {
        if error < self.error {
            self.error = error;
            self.iteration = iteration;
            self.weights = live.to_vec();
            true
        } else {
            false
        }
    }
}

impl Default for BestWeights {
    fn default() -> Self {
        Self::new()
    }
}
