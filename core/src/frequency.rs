//! Frequency matrix: household record × calibration attribute incidence.
//!
//! Stored column-wise and collapsed: every attribute keeps only the rows
//! whose incidence is nonzero, so calibration passes never touch a zero cell.

use crate::{
    error::{SynPopError, SynPopResult},
    microdata::{HouseholdField, MicroData, PersonField},
    types::RecordIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Matcher {
    Equals { value: i64 },
    /// Half-open: `low <= v < high`.
    Between { low: i64, high: i64 },
}

impl Matcher {
    pub fn matches(&self, v: i64) -> bool {
        match *self {
            Matcher::Equals { value } => v == value,
            Matcher::Between { low, high } => v >= low && v < high,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "field", rename_all = "snake_case")]
pub enum AttributeLevel {
    /// Incidence is 0 or 1 per household.
    Household(HouseholdField),
    /// Incidence counts the matching persons of the household.
    Person(PersonField),
}

/// Declarative definition of one calibration attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name:    String,
    pub level:   AttributeLevel,
    pub matcher: Matcher,
}

/// The nonzero rows of one attribute column.
#[derive(Debug, Clone)]
pub struct AttributeColumn {
    pub name:   String,
    /// Strictly increasing row indices with nonzero incidence.
    pub rows:   Vec<RecordIndex>,
    pub counts: Vec<f64>,
}

impl AttributeColumn {
    pub fn nonzero_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn weighted_sum(&self, weights: &[f64]) -> f64 {
        self.rows
            .iter()
            .zip(&self.counts)
            .map(|(&r, &c)| weights[r] * c)
            .sum()
    }

    /// Multiply the weight of every incident row by `factor`.
    pub fn scale(&self, weights: &mut [f64], factor: f64) {
        for &r in &self.rows {
            weights[r] *= factor;
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrequencyMatrix {
    /// Micro household id behind each row, for traceability.
    record_ids:     Vec<u32>,
    group_quarters: Vec<bool>,
    columns:        Vec<AttributeColumn>,
    by_name:        HashMap<String, usize>,
}

impl FrequencyMatrix {
    /// Count attribute incidences for every household of the micro-data.
    pub fn build(data: &MicroData, specs: &[AttributeSpec]) -> SynPopResult<Self> {
        let mut columns: Vec<AttributeColumn> = specs
            .iter()
            .map(|s| AttributeColumn {
                name: s.name.clone(),
                rows: Vec::new(),
                counts: Vec::new(),
            })
            .collect();

        for (row, hh) in data.households.iter().enumerate() {
            let persons = data.persons_of(row);
            for (spec, column) in specs.iter().zip(columns.iter_mut()) {
                let count = match spec.level {
                    AttributeLevel::Household(field) => {
                        if spec.matcher.matches(hh.field(field)) { 1 } else { 0 }
                    }
                    AttributeLevel::Person(field) => persons
                        .iter()
                        .filter(|p| spec.matcher.matches(p.field(field)))
                        .count(),
                };
                if count > 0 {
                    column.rows.push(row);
                    column.counts.push(count as f64);
                }
            }
        }

        let matrix = Self::assemble(
            data.households.iter().map(|h| h.id).collect(),
            data.households.iter().map(|h| h.group_quarters).collect(),
            columns,
        )?;
        log::debug!(
            "frequency matrix: {} records x {} attributes",
            matrix.record_count(),
            matrix.attribute_count()
        );
        Ok(matrix)
    }

    /// Build from dense rows (`rows[record][attribute]`). Zero cells are dropped.
    pub fn from_dense(names: &[&str], rows: &[Vec<f64>]) -> SynPopResult<Self> {
        let mut columns: Vec<AttributeColumn> = names
            .iter()
            .map(|n| AttributeColumn {
                name: n.to_string(),
                rows: Vec::new(),
                counts: Vec::new(),
            })
            .collect();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != names.len() {
                return Err(SynPopError::ShapeMismatch {
                    context: format!("frequency row {r}"),
                    expected: names.len(),
                    actual: row.len(),
                });
            }
            for (column, &v) in columns.iter_mut().zip(row) {
                if v != 0.0 {
                    column.rows.push(r);
                    column.counts.push(v);
                }
            }
        }
        Self::assemble(
            (0..rows.len() as u32).collect(),
            vec![false; rows.len()],
            columns,
        )
    }

    fn assemble(
        record_ids: Vec<u32>,
        group_quarters: Vec<bool>,
        columns: Vec<AttributeColumn>,
    ) -> SynPopResult<Self> {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            if by_name.insert(c.name.clone(), i).is_some() {
                return Err(anyhow::anyhow!("duplicate calibration attribute '{}'", c.name).into());
            }
        }
        Ok(Self { record_ids, group_quarters, columns, by_name })
    }

    /// Mark rows as group quarters (excluded from household selection).
    pub fn with_group_quarters(mut self, flags: Vec<bool>) -> SynPopResult<Self> {
        if flags.len() != self.record_count() {
            return Err(SynPopError::ShapeMismatch {
                context: "group-quarters flags".into(),
                expected: self.record_count(),
                actual: flags.len(),
            });
        }
        self.group_quarters = flags;
        Ok(self)
    }

    /// Restrict to the given rows, renumbered in the order given.
    pub fn subset(&self, rows: &[RecordIndex]) -> SynPopResult<Self> {
        let mut remap = HashMap::with_capacity(rows.len());
        for (new, &old) in rows.iter().enumerate() {
            if old >= self.record_count() {
                return Err(SynPopError::ShapeMismatch {
                    context: "frequency matrix subset".into(),
                    expected: self.record_count(),
                    actual: old + 1,
                });
            }
            remap.insert(old, new);
        }
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut pairs: Vec<(RecordIndex, f64)> = c
                    .rows
                    .iter()
                    .zip(&c.counts)
                    .filter_map(|(r, &v)| remap.get(r).map(|&n| (n, v)))
                    .collect();
                pairs.sort_by_key(|&(r, _)| r);
                AttributeColumn {
                    name: c.name.clone(),
                    rows: pairs.iter().map(|&(r, _)| r).collect(),
                    counts: pairs.iter().map(|&(_, v)| v).collect(),
                }
            })
            .collect();
        Self::assemble(
            rows.iter().map(|&r| self.record_ids[r]).collect(),
            rows.iter().map(|&r| self.group_quarters[r]).collect(),
            columns,
        )
    }

    pub fn record_count(&self) -> usize {
        self.record_ids.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.columns.len()
    }

    pub fn record_id(&self, row: RecordIndex) -> u32 {
        self.record_ids[row]
    }

    pub fn is_group_quarters(&self, row: RecordIndex) -> bool {
        self.group_quarters[row]
    }

    pub fn columns(&self) -> &[AttributeColumn] {
        &self.columns
    }

    pub fn column(&self, attribute: usize) -> &AttributeColumn {
        &self.columns[attribute]
    }

    pub fn attribute_index(&self, name: &str) -> SynPopResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SynPopError::UnknownAttribute { name: name.to_string() })
    }

    pub fn incidence(&self, row: RecordIndex, attribute: usize) -> f64 {
        let c = &self.columns[attribute];
        match c.rows.binary_search(&row) {
            Ok(i) => c.counts[i],
            Err(_) => 0.0,
        }
    }

    /// Weighted column sums for every attribute.
    pub fn weighted_sums(&self, weights: &[f64]) -> Vec<f64> {
        self.columns.iter().map(|c| c.weighted_sum(weights)).collect()
    }
}
