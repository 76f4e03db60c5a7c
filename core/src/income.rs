//! Continuous income resampling from bracketed census income.
//!
//! Each bracket [low, high) maps to the quantile range [F(low), F(high)) of a
//! Gamma distribution fitted to the micro-data. A uniform draw inside that
//! range goes through the inverse CDF, so synthetic incomes spread over the
//! bracket instead of piling up at its midpoint.

use crate::{
    config::IncomeConfig,
    error::{SynPopError, SynPopResult},
    rng::StageRng,
};
use statrs::distribution::{ContinuousCDF, Gamma};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct BracketRange {
    low:    f64,
    high:   f64,
    q_low:  f64,
    q_high: f64,
}

#[derive(Debug, Clone)]
pub struct IncomeModel {
    gamma:          Gamma,
    no_income_code: i32,
    ranges:         HashMap<i32, BracketRange>,
    /// (code, low, high) in ascending order, sentinel excluded.
    ordered:        Vec<(i32, f64, f64)>,
}

impl IncomeModel {
    pub fn new(config: &IncomeConfig) -> SynPopResult<Self> {
        let gamma = Gamma::new(config.gamma_shape, config.gamma_rate).map_err(|e| {
            SynPopError::InvalidDistribution(format!(
                "gamma(shape={}, rate={}): {e}",
                config.gamma_shape, config.gamma_rate
            ))
        })?;

        let mut ranges = HashMap::new();
        let mut ordered = Vec::new();
        for b in &config.brackets {
            if b.code == config.no_income_code {
                continue;
            }
            let high = b.high.unwrap_or(f64::INFINITY);
            if !(high > b.low) || b.low < 0.0 {
                return Err(SynPopError::InvalidDistribution(format!(
                    "income bracket {} has empty range [{}, {})",
                    b.code, b.low, high
                )));
            }
            let q_high = if high.is_finite() { gamma.cdf(high) } else { 1.0 };
            ranges.insert(
                b.code,
                BracketRange { low: b.low, high, q_low: gamma.cdf(b.low), q_high },
            );
            ordered.push((b.code, b.low, high));
        }
        ordered.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(Self { gamma, no_income_code: config.no_income_code, ranges, ordered })
    }

    /// Draw a continuous income inside the bracket's range.
    pub fn sample(&self, bracket_code: i32, rng: &mut StageRng) -> SynPopResult<f64> {
        if bracket_code == self.no_income_code {
            return Ok(0.0);
        }
        let r = self.ranges.get(&bracket_code).ok_or_else(|| SynPopError::MissingCategory {
            dictionary: "income_bracket".into(),
            code: bracket_code.to_string(),
        })?;

        let u = rng.uniform(r.q_low, r.q_high);
        let mut income = self.gamma.inverse_cdf(u);
        // The inverse CDF is solved numerically; pin the result to the bracket.
        if !income.is_finite() || income < r.low {
            income = r.low;
        }
        if r.high.is_finite() {
            let ceiling = r.high - (r.high - r.low) * 1e-9;
            income = income.min(ceiling);
        }
        Ok(income)
    }

    /// Bracket code an income falls into, ignoring the no-income sentinel.
    pub fn bracket_of(&self, income: f64) -> Option<i32> {
        self.ordered
            .iter()
            .find(|(_, low, high)| income >= *low && income < *high)
            .map(|(code, _, _)| *code)
    }

    pub fn no_income_code(&self) -> i32 {
        self.no_income_code
    }
}
