//! Iterative Proportional Updating (IPU) solver.
//!
//! Calibrates one weight per micro-data record so that weighted attribute
//! sums match marginal targets. Single-level calibration fits one
//! municipality; nested calibration first fits a region's totals across all
//! of its municipalities and then each municipality's own totals, once per
//! iteration.
//!
//! Convergence requires every defined attribute error below `max_error`;
//! the stall and divergence checks compare average errors.
//!
//! Termination is never an error: convergence, stalling, divergence and the
//! iteration cap all return the lowest-error weights observed.

use crate::{
    config::IpuParams,
    error::SynPopResult,
    frequency::FrequencyMatrix,
    geography::AttributeTargets,
    types::{GeoId, RegionId},
    weights::{BestWeights, WeightTable, WeightVector},
};
use serde::{Deserialize, Serialize};

/// How scaling factors within one half-pass see each other's updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Each attribute's factor is computed from weights already scaled by
    /// the attributes before it. Order dependent.
    #[default]
    Sequential,
    /// All factors of a half-pass are computed from one weight snapshot and
    /// then applied together.
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    Stalled,
    Diverging,
    MaxIterations,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Stalled => "stalled",
            Self::Diverging => "diverging",
            Self::MaxIterations => "max_iterations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetLevel {
    Municipality,
    Region,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeError {
    pub geography:      u32,
    pub level:          TargetLevel,
    pub attribute:      String,
    pub target:         f64,
    pub weighted_sum:   f64,
    /// `None` when the error is undefined (no eligible rows, or zero target).
    pub relative_error: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub iterations:       u32,
    /// Average error of the last iteration run.
    pub final_error:      f64,
    /// Average error of the returned weights.
    pub best_error:       f64,
    pub best_iteration:   u32,
    pub termination:      Termination,
    /// Per-attribute errors evaluated on the returned weights.
    pub attribute_errors: Vec<AttributeError>,
}

#[derive(Debug, Clone)]
pub struct Calibration {
    pub weights: WeightTable,
    pub report:  CalibrationReport,
}

struct ResolvedTargets {
    geography: u32,
    level:     TargetLevel,
    /// (attribute index, target)
    entries:   Vec<(usize, f64)>,
}

pub struct IpuSolver<'a> {
    matrix: &'a FrequencyMatrix,
    params: &'a IpuParams,
}

impl<'a> IpuSolver<'a> {
    pub fn new(matrix: &'a FrequencyMatrix, params: &'a IpuParams) -> Self {
        Self { matrix, params }
    }

    /// Fit one geography's weights against its own targets.
    pub fn calibrate(&self, geo: GeoId, targets: &AttributeTargets) -> SynPopResult<Calibration> {
        let resolved = self.resolve(geo, TargetLevel::Municipality, targets)?;
        Ok(self.run(&format!("geo={geo}"), None, vec![resolved]))
    }

    /// Fit a region's municipalities together: region totals are matched by
    /// the sum over all member municipalities, municipality totals by each
    /// municipality alone.
    pub fn calibrate_nested(
        &self,
        region: RegionId,
        region_targets: &AttributeTargets,
        municipalities: &[(GeoId, &AttributeTargets)],
    ) -> SynPopResult<Calibration> {
        let region_resolved = self.resolve(region, TargetLevel::Region, region_targets)?;
        let munis = municipalities
            .iter()
            .map(|(geo, t)| self.resolve(*geo, TargetLevel::Municipality, t))
            .collect::<SynPopResult<Vec<_>>>()?;
        Ok(self.run(&format!("region={region}"), Some(region_resolved), munis))
    }

    fn resolve(
        &self,
        geography: u32,
        level: TargetLevel,
        targets: &AttributeTargets,
    ) -> SynPopResult<ResolvedTargets> {
        let mut entries = Vec::with_capacity(targets.len());
        for (name, &target) in targets {
            let attr = self.matrix.attribute_index(name)?;
            if target > 0.0 && self.matrix.column(attr).nonzero_rows() == 0 {
                log::warn!(
                    "geo={geography} ipu: attribute '{name}' has target {target} but no eligible records"
                );
            }
            entries.push((attr, target));
        }
        Ok(ResolvedTargets { geography, level, entries })
    }

    fn run(
        &self,
        label: &str,
        region: Option<ResolvedTargets>,
        municipalities: Vec<ResolvedTargets>,
    ) -> Calibration {
        let p = self.params;
        let n = self.matrix.record_count();
        let mut live: Vec<Vec<f64>> = vec![vec![1.0; n]; municipalities.len()];
        let mut best = BestWeights::new();
        let mut checkpoint_error = p.initial_error_guess;
        let mut iteration = 0u32;
        let mut error = f64::INFINITY;
        let mut termination = Termination::MaxIterations;

        while iteration < p.max_iterations {
            iteration += 1;

            if let Some(r) = &region {
                self.scale_pass(&r.entries, &mut live);
            }
            for (m, weights) in municipalities.iter().zip(live.iter_mut()) {
                self.scale_pass(&m.entries, std::slice::from_mut(weights));
            }

            let errors = self.attribute_errors(region.as_ref(), &municipalities, &live);
            error = average_error(&errors);
            if best.offer(iteration, error, &live) {
                log::debug!("{label} ipu: iteration {iteration} new best error {error:.6}");
            }

            // Every attribute must be inside tolerance, not just the mean.
            if worst_error(&errors) < p.max_error {
                termination = Termination::Converged;
                break;
            }
            if p.iterations_per_improvement_check > 0
                && iteration % p.iterations_per_improvement_check == 0
            {
                let improvement = if checkpoint_error > 0.0 {
                    ((checkpoint_error - error) / checkpoint_error).abs()
                } else {
                    0.0
                };
                log::debug!(
                    "{label} ipu: checkpoint at iteration {iteration}: error {error:.6}, improvement {improvement:.6}"
                );
                if improvement < p.improvement_error_threshold {
                    termination = Termination::Stalled;
                    break;
                }
                if error > best.error * p.error_increase_factor {
                    termination = Termination::Diverging;
                    break;
                }
                checkpoint_error = error;
            }
        }

        let final_weights = if best.weights.is_empty() { live } else { best.weights };
        let attribute_errors =
            self.attribute_errors(region.as_ref(), &municipalities, &final_weights);
        let best_error = average_error(&attribute_errors);

        match termination {
            Termination::Converged => log::info!(
                "{label} ipu: converged after {iteration} iterations, error {best_error:.6}"
            ),
            other => log::warn!(
                "{label} ipu: {} after {iteration} iterations, last error {error:.6}, best error {best_error:.6} at iteration {}",
                other.as_str(),
                best.iteration
            ),
        }

        let mut weights = WeightTable::default();
        for (m, w) in municipalities.iter().zip(final_weights) {
            weights.insert(WeightVector { geography: m.geography, weights: w });
        }

        Calibration {
            weights,
            report: CalibrationReport {
                iterations: iteration,
                final_error: error,
                best_error,
                best_iteration: best.iteration,
                termination,
                attribute_errors,
            },
        }
    }

    /// Scale `vectors` so each attribute's sum across all of them hits its target.
    fn scale_pass(&self, entries: &[(usize, f64)], vectors: &mut [Vec<f64>]) {
        match self.params.update_mode {
            UpdateMode::Sequential => {
                for &(attr, target) in entries {
                    if let Some(factor) = self.factor(attr, target, vectors) {
                        let column = self.matrix.column(attr);
                        for w in vectors.iter_mut() {
                            column.scale(w, factor);
                        }
                    }
                }
            }
            UpdateMode::Batch => {
                let factors: Vec<(usize, Option<f64>)> = entries
                    .iter()
                    .map(|&(attr, target)| (attr, self.factor(attr, target, vectors)))
                    .collect();
                for (attr, factor) in factors {
                    if let Some(factor) = factor {
                        let column = self.matrix.column(attr);
                        for w in vectors.iter_mut() {
                            column.scale(w, factor);
                        }
                    }
                }
            }
        }
    }

    /// `target / weighted_sum`, or `None` when the attribute carries no mass.
    fn factor(&self, attr: usize, target: f64, vectors: &[Vec<f64>]) -> Option<f64> {
        let column = self.matrix.column(attr);
        let sum: f64 = vectors.iter().map(|w| column.weighted_sum(w)).sum();
        if sum > 0.0 {
            Some(target / sum)
        } else {
            None
        }
    }

    fn attribute_errors(
        &self,
        region: Option<&ResolvedTargets>,
        municipalities: &[ResolvedTargets],
        weights: &[Vec<f64>],
    ) -> Vec<AttributeError> {
        let mut out = Vec::new();
        if let Some(r) = region {
            for &(attr, target) in &r.entries {
                let column = self.matrix.column(attr);
                let sum: f64 = weights.iter().map(|w| column.weighted_sum(w)).sum();
                out.push(self.attribute_error(r, attr, target, sum));
            }
        }
        for (m, w) in municipalities.iter().zip(weights) {
            for &(attr, target) in &m.entries {
                let sum = self.matrix.column(attr).weighted_sum(w);
                out.push(self.attribute_error(m, attr, target, sum));
            }
        }
        out
    }

    fn attribute_error(
        &self,
        owner: &ResolvedTargets,
        attr: usize,
        target: f64,
        weighted_sum: f64,
    ) -> AttributeError {
        let column = self.matrix.column(attr);
        let relative_error = if column.nonzero_rows() == 0 || target <= 0.0 {
            None
        } else {
            Some((weighted_sum - target).abs() / target)
        };
        AttributeError {
            geography: owner.geography,
            level: owner.level,
            attribute: column.name.clone(),
            target,
            weighted_sum,
            relative_error,
        }
    }
}

/// Mean of the defined relative errors; zero when none is defined.
pub fn average_error(errors: &[AttributeError]) -> f64 {
    let defined: Vec<f64> = errors.iter().filter_map(|e| e.relative_error).collect();
    if defined.is_empty() {
        0.0
    } else {
        defined.iter().sum::<f64>() / defined.len() as f64
    }
}

/// Largest defined relative error; zero when none is defined.
pub fn worst_error(errors: &[AttributeError]) -> f64 {
    errors
        .iter()
        .filter_map(|e| e.relative_error)
        .fold(0.0, f64::max)
}
