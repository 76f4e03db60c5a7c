//! Residual-weight sampling.
//!
//! Draws an index with probability proportional to its current residual
//! weight; callers then decrement the drawn index's residual (floored at
//! zero). This only approximates sampling without replacement: once every
//! residual is exhausted, draws fall back to the original weights, and if
//! those are all zero as well, to a uniform draw over eligible indices.

use crate::rng::StageRng;

#[derive(Debug, Clone)]
pub struct ResidualSampler {
    seeds:    Vec<f64>,
    residual: Vec<f64>,
    eligible: Vec<bool>,
    mass:     f64,
}

impl ResidualSampler {
    /// Every index with a finite weight is eligible.
    pub fn new(weights: &[f64]) -> Self {
        Self::with_eligibility(weights, |_| true)
    }

    /// Indices rejected by `eligible` are never drawn.
    pub fn with_eligibility(weights: &[f64], eligible: impl Fn(usize) -> bool) -> Self {
        let eligible: Vec<bool> = (0..weights.len())
            .map(|i| eligible(i) && weights[i].is_finite())
            .collect();
        let seeds: Vec<f64> = weights
            .iter()
            .zip(&eligible)
            .map(|(&w, &ok)| if ok { w.max(0.0) } else { 0.0 })
            .collect();
        let mass = seeds.iter().sum();
        Self { residual: seeds.clone(), seeds, eligible, mass }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn residual(&self, index: usize) -> f64 {
        self.residual[index]
    }

    pub fn remaining_mass(&self) -> f64 {
        self.mass
    }

    pub fn has_eligible(&self) -> bool {
        self.eligible.iter().any(|&e| e)
    }

    /// Draw one index. `None` only when no index is eligible.
    pub fn draw(&mut self, rng: &mut StageRng) -> Option<usize> {
        if self.mass <= 0.0 {
            // Guard against drift in the running total.
            self.mass = self.residual.iter().sum();
        }
        if self.mass > 0.0 {
            if let Some(i) = proportional_pick(&self.residual, self.mass, rng) {
                return Some(i);
            }
            // Rounding left mass behind on fully consumed residuals.
            self.mass = 0.0;
        }
        let seed_mass: f64 = self.seeds.iter().sum();
        if seed_mass > 0.0 {
            return proportional_pick(&self.seeds, seed_mass, rng);
        }
        let candidates: Vec<usize> = (0..self.eligible.len()).filter(|&i| self.eligible[i]).collect();
        if candidates.is_empty() {
            None
        } else {
            Some(candidates[rng.next_index_below(candidates.len())])
        }
    }

    /// Reduce an index's residual weight by `amount`, never below zero.
    pub fn consume(&mut self, index: usize, amount: f64) {
        let before = self.residual[index];
        let after = (before - amount).max(0.0);
        self.residual[index] = after;
        self.mass = (self.mass - (before - after)).max(0.0);
    }
}

/// Cumulative-sum search over a uniform draw scaled by `total`.
fn proportional_pick(weights: &[f64], total: f64, rng: &mut StageRng) -> Option<usize> {
    let roll = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        if roll < cumulative {
            return Some(i);
        }
    }
    weights.iter().rposition(|&w| w > 0.0)
}
