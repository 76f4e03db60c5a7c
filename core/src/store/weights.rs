//! Calibrated weight persistence, keyed by a caller-chosen weights key so a
//! later run can skip calibration.

use super::SynPopStore;
use crate::{
    error::SynPopResult,
    frequency::FrequencyMatrix,
    weights::{WeightTable, WeightVector},
};
use rusqlite::params;

impl SynPopStore {
    /// Replace every weight stored under `weights_key`.
    pub fn save_weights(
        &self,
        weights_key: &str,
        table: &WeightTable,
        matrix: &FrequencyMatrix,
    ) -> SynPopResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM ipu_weights WHERE weights_key = ?1", params![weights_key])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ipu_weights (weights_key, geography, row_index, record_id, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for vector in table.iter() {
                for (row, &w) in vector.weights.iter().enumerate() {
                    stmt.execute(params![
                        weights_key,
                        vector.geography,
                        row as i64,
                        matrix.record_id(row),
                        w,
                    ])?;
                }
            }
        }
        tx.commit()?;
        log::debug!("saved {} weight vectors under key '{weights_key}'", table.len());
        Ok(())
    }

    /// Stored weights for `weights_key`, or `None` when nothing was saved.
    pub fn load_weights(&self, weights_key: &str) -> SynPopResult<Option<WeightTable>> {
        let mut stmt = self.conn.prepare(
            "SELECT geography, weight FROM ipu_weights
             WHERE weights_key = ?1
             ORDER BY geography ASC, row_index ASC",
        )?;
        let rows = stmt
            .query_map(params![weights_key], |r| Ok((r.get::<_, u32>(0)?, r.get::<_, f64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut table = WeightTable::default();
        let mut current: Option<WeightVector> = None;
        for (geography, weight) in rows {
            match current.as_mut() {
                Some(v) if v.geography == geography => v.weights.push(weight),
                _ => {
                    if let Some(done) = current.take() {
                        table.insert(done);
                    }
                    current = Some(WeightVector { geography, weights: vec![weight] });
                }
            }
        }
        if let Some(done) = current {
            table.insert(done);
        }
        Ok(Some(table))
    }
}
