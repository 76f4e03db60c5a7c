//! Calibration, synthesis and assignment diagnostics.

use super::SynPopStore;
use crate::{
    diagnostics::{OdFlows, TripLengthHistogram},
    error::SynPopResult,
    ipu::AttributeError,
    synthesis::SynthesisDiagnostic,
};
use rusqlite::params;

#[derive(Debug, Clone, PartialEq)]
pub struct TripLengthRow {
    pub bin:        usize,
    pub lower:      f64,
    pub count:      u64,
    pub cumulative: f64,
}

impl SynPopStore {
    pub fn insert_calibration_errors(&self, run_id: &str, errors: &[AttributeError]) -> SynPopResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO calibration_error
                   (run_id, geography, level, attribute, target, weighted_sum, relative_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for e in errors {
                let level = match e.level {
                    crate::ipu::TargetLevel::Municipality => "municipality",
                    crate::ipu::TargetLevel::Region => "region",
                };
                stmt.execute(params![
                    run_id,
                    e.geography,
                    level,
                    e.attribute,
                    e.target,
                    e.weighted_sum,
                    e.relative_error,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// (geography, attribute, relative error) of every stored calibration row.
    pub fn calibration_errors_for_run(&self, run_id: &str) -> SynPopResult<Vec<(u32, String, Option<f64>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT geography, attribute, relative_error FROM calibration_error
             WHERE run_id = ?1 ORDER BY geography, attribute",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_synthesis_diagnostics(
        &self,
        run_id: &str,
        diagnostics: &[SynthesisDiagnostic],
    ) -> SynPopResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO synthesis_diagnostic
                   (run_id, geography, attribute, target, realized, relative_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for e in diagnostics {
                stmt.execute(params![
                    run_id,
                    e.geography,
                    e.attribute,
                    e.target,
                    e.realized,
                    e.relative_error,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn synthesis_diagnostics_for_run(&self, run_id: &str) -> SynPopResult<Vec<SynthesisDiagnostic>> {
        let mut stmt = self.conn.prepare(
            "SELECT geography, attribute, target, realized, relative_error FROM synthesis_diagnostic
             WHERE run_id = ?1 ORDER BY geography, attribute",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok(SynthesisDiagnostic {
                    geography:      r.get(0)?,
                    attribute:      r.get(1)?,
                    target:         r.get(2)?,
                    realized:       r.get(3)?,
                    relative_error: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_trip_lengths(
        &self,
        run_id: &str,
        label: &str,
        histogram: &TripLengthHistogram,
    ) -> SynPopResult<()> {
        let cumulative = histogram.cumulative_frequency();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO trip_length (run_id, label, bin, lower, count, cumulative)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (bin, (&count, &cum)) in histogram.counts.iter().zip(&cumulative).enumerate() {
                stmt.execute(params![
                    run_id,
                    label,
                    bin as i64,
                    bin as f64 * histogram.bin_width,
                    count as i64,
                    cum,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn trip_lengths_for_run(&self, run_id: &str, label: &str) -> SynPopResult<Vec<TripLengthRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT bin, lower, count, cumulative FROM trip_length
             WHERE run_id = ?1 AND label = ?2 ORDER BY bin ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id, label], |r| {
                Ok(TripLengthRow {
                    bin:        r.get::<_, i64>(0)? as usize,
                    lower:      r.get(1)?,
                    count:      r.get::<_, i64>(2)? as u64,
                    cumulative: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_od_flows(&self, run_id: &str, label: &str, flows: &OdFlows) -> SynPopResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO od_flow (run_id, label, origin, destination, count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (&(origin, destination), &count) in &flows.flows {
                stmt.execute(params![run_id, label, origin, destination, count as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn od_flow_total(&self, run_id: &str, label: &str) -> SynPopResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(count), 0) FROM od_flow WHERE run_id = ?1 AND label = ?2",
            params![run_id, label],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }
}
