//! Zone-to-zone distances and distance-decay impedance.

use crate::{
    error::{SynPopError, SynPopResult},
    types::ZoneId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Distance-decay function turning a distance into a choice impedance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecayFunction {
    /// `exp(alpha * exp(gamma * d))`
    DoubleExponential { alpha: f64, gamma: f64 },
    /// `exp(beta * d)`, for long-distance or coarse destinations.
    Exponential { beta: f64 },
}

impl DecayFunction {
    pub fn impedance(&self, distance: f64) -> f64 {
        match *self {
            DecayFunction::DoubleExponential { alpha, gamma } => (alpha * (gamma * distance).exp()).exp(),
            DecayFunction::Exponential { beta } => (beta * distance).exp(),
        }
    }
}

/// Dense origin-destination skim keyed by zone id.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    zones:  Vec<ZoneId>,
    index:  HashMap<ZoneId, usize>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// `values` is row-major: `values[o * n + d]`.
    pub fn new(zones: Vec<ZoneId>, values: Vec<f64>) -> SynPopResult<Self> {
        let n = zones.len();
        if values.len() != n * n {
            return Err(SynPopError::ShapeMismatch {
                context: "distance matrix".into(),
                expected: n * n,
                actual: values.len(),
            });
        }
        let index: HashMap<ZoneId, usize> = zones.iter().enumerate().map(|(i, &z)| (z, i)).collect();
        if index.len() != n {
            return Err(anyhow::anyhow!("distance matrix lists a zone twice").into());
        }
        Ok(Self { zones, index, values })
    }

    /// Build from nested rows, one per origin zone.
    pub fn from_rows(zones: Vec<ZoneId>, rows: Vec<Vec<f64>>) -> SynPopResult<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != zones.len()) {
            return Err(SynPopError::ShapeMismatch {
                context: format!("distance matrix row {i}"),
                expected: zones.len(),
                actual: row.len(),
            });
        }
        if rows.len() != zones.len() {
            return Err(SynPopError::ShapeMismatch {
                context: "distance matrix rows".into(),
                expected: zones.len(),
                actual: rows.len(),
            });
        }
        Self::new(zones, rows.into_iter().flatten().collect())
    }

    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn index_of(&self, zone: ZoneId) -> SynPopResult<usize> {
        self.index.get(&zone).copied().ok_or_else(|| SynPopError::UnknownZone {
            zone,
            context: "distance matrix".into(),
        })
    }

    pub fn by_index(&self, origin: usize, destination: usize) -> f64 {
        self.values[origin * self.zones.len() + destination]
    }

    pub fn distance(&self, origin: ZoneId, destination: ZoneId) -> SynPopResult<f64> {
        Ok(self.by_index(self.index_of(origin)?, self.index_of(destination)?))
    }
}

/// Impedance for every zone pair under one decay function.
#[derive(Debug, Clone)]
pub struct ImpedanceMatrix {
    n:      usize,
    values: Vec<f64>,
}

impl ImpedanceMatrix {
    pub fn compute(distances: &DistanceMatrix, decay: DecayFunction) -> Self {
        let n = distances.zone_count();
        let values = (0..n * n)
            .map(|k| decay.impedance(distances.by_index(k / n, k % n)))
            .collect();
        Self { n, values }
    }

    pub fn by_index(&self, origin: usize, destination: usize) -> f64 {
        self.values[origin * self.n + destination]
    }
}
