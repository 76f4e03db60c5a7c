//! Synthetic population and binding rows.

use super::SynPopStore;
use crate::{
    error::SynPopResult,
    population::{Binding, SyntheticPopulation},
    types::PersonId,
};
use rusqlite::params;
use serde::Serialize;
use std::fmt::Display;

/// Category enums are stored by their serde name.
fn label<T: Serialize>(value: &T) -> SynPopResult<String> {
    Ok(match serde_json::to_value(value)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// One row of the binding table.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingRow {
    pub person_id: PersonId,
    pub purpose:   String,
    pub kind:      Option<String>,
    pub binding:   Binding,
}

impl SynPopStore {
    pub fn insert_population(&self, run_id: &str, population: &SyntheticPopulation) -> SynPopResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO household
                   (run_id, household_id, geography, zone, dwelling_id, micro_record_id,
                    size, income_bracket, income)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for h in &population.households {
                stmt.execute(params![
                    run_id,
                    h.id as i64,
                    h.geography,
                    h.zone,
                    h.dwelling_id as i64,
                    h.micro_record_id,
                    h.size,
                    h.income_bracket,
                    h.income,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO person
                   (run_id, person_id, household_id, zone, micro_record_id, age, gender,
                    occupation, nationality, job_sector, education, school_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for p in &population.persons {
                stmt.execute(params![
                    run_id,
                    p.id as i64,
                    p.household_id as i64,
                    p.zone,
                    p.micro_record_id,
                    p.age,
                    label(&p.gender)?,
                    label(&p.occupation)?,
                    p.nationality,
                    p.job_sector.map(|j| j.code()),
                    label(&p.education)?,
                    p.school_type.map(|s| s.code()),
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO dwelling
                   (run_id, dwelling_id, geography, zone, household_id, dwelling_type,
                    usage, year_bracket, floor_space)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for d in &population.dwellings {
                stmt.execute(params![
                    run_id,
                    d.id as i64,
                    d.geography,
                    d.zone,
                    d.household_id.map(|h| h as i64),
                    d.dwelling_type,
                    d.usage,
                    d.year_bracket,
                    d.floor_space,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Persist assignment bindings under `purpose` ("job" or "school").
    pub fn insert_bindings<K: Display>(
        &self,
        run_id: &str,
        purpose: &str,
        bindings: &[(PersonId, Option<K>, Binding)],
    ) -> SynPopResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO binding
                   (run_id, person_id, purpose, kind, zone, entity_id, outside)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (person, kind, binding) in bindings {
                let (zone, entity) = match *binding {
                    Binding::Assigned { zone, entity } => (Some(zone), Some(entity as i64)),
                    Binding::Outside => (None, None),
                };
                stmt.execute(params![
                    run_id,
                    *person as i64,
                    purpose,
                    kind.as_ref().map(|k| k.to_string()),
                    zone,
                    entity,
                    binding.is_outside() as i32,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn bindings_for_run(&self, run_id: &str, purpose: &str) -> SynPopResult<Vec<BindingRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT person_id, purpose, kind, zone, entity_id, outside
             FROM binding WHERE run_id = ?1 AND purpose = ?2
             ORDER BY person_id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id, purpose], |r| {
                let zone: Option<u32> = r.get(3)?;
                let entity: Option<i64> = r.get(4)?;
                let outside: i32 = r.get(5)?;
                let binding = match (outside, zone, entity) {
                    (0, Some(zone), Some(entity)) => Binding::Assigned { zone, entity: entity as u64 },
                    _ => Binding::Outside,
                };
                Ok(BindingRow {
                    person_id: r.get::<_, i64>(0)? as u64,
                    purpose:   r.get(1)?,
                    kind:      r.get(2)?,
                    binding,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
