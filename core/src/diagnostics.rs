//! Validation outputs of the assignment stage.
//!
//! Emitted for offline comparison against observed travel data; nothing in
//! the pipeline reads them back.

use crate::types::ZoneId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-width trip-length histogram. The last bin collects everything at
/// or beyond its lower edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripLengthHistogram {
    pub bin_width: f64,
    pub counts:    Vec<u64>,
}

impl TripLengthHistogram {
    pub fn new(bin_width: f64, bins: usize) -> Self {
        Self { bin_width, counts: vec![0; bins.max(1)] }
    }

    pub fn record(&mut self, distance: f64) {
        let last = self.counts.len() - 1;
        let bin = if distance.is_nan() || distance <= 0.0 {
            0
        } else {
            ((distance / self.bin_width) as usize).min(last)
        };
        self.counts[bin] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Share of trips with length below each bin's upper edge.
    pub fn cumulative_frequency(&self) -> Vec<f64> {
        let total = self.total();
        let mut running = 0u64;
        self.counts
            .iter()
            .map(|&c| {
                running += c;
                if total == 0 { 0.0 } else { running as f64 / total as f64 }
            })
            .collect()
    }
}

/// Realized origin → destination flow counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OdFlows {
    pub flows: BTreeMap<(ZoneId, ZoneId), u64>,
}

impl OdFlows {
    pub fn record(&mut self, origin: ZoneId, destination: ZoneId) {
        *self.flows.entry((origin, destination)).or_insert(0) += 1;
    }

    pub fn get(&self, origin: ZoneId, destination: ZoneId) -> u64 {
        self.flows.get(&(origin, destination)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.flows.values().sum()
    }
}
