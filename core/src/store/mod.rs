//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Stages hand their results to store methods; they never execute SQL.

mod diagnostics;
mod population;
mod weights;

pub use population::BindingRow;
pub use diagnostics::TripLengthRow;

use crate::{error::SynPopResult, event::EventLogEntry};
use rusqlite::{params, Connection};

pub struct SynPopStore {
    conn: Connection,
}

impl SynPopStore {
    pub fn open(path: &str) -> SynPopResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SynPopResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SynPopResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_calibration.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_population.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_assignment.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, weights_key: &str, version: &str) -> SynPopResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, weights_key, version, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, seed as i64, weights_key, version, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn complete_run(&self, run_id: &str) -> SynPopResult<()> {
        self.conn.execute(
            "UPDATE run SET completed_at = ?1 WHERE run_id = ?2",
            params![chrono::Utc::now().to_rfc3339(), run_id],
        )?;
        Ok(())
    }

    pub fn run_seed(&self, run_id: &str) -> SynPopResult<u64> {
        let seed: i64 = self.conn.query_row(
            "SELECT seed FROM run WHERE run_id = ?1",
            params![run_id],
            |r| r.get(0),
        )?;
        Ok(seed as u64)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SynPopResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, sequence, stage, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.sequence as i64,
                entry.stage,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> SynPopResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, sequence, stage, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY sequence ASC, id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    sequence:   row.get::<_, i64>(2)? as u64,
                    stage:      row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ── Counts ─────────────────────────────────────────────────

    pub fn count_households(&self, run_id: &str) -> SynPopResult<usize> {
        self.count_for_run("household", run_id)
    }

    pub fn count_persons(&self, run_id: &str) -> SynPopResult<usize> {
        self.count_for_run("person", run_id)
    }

    pub fn count_dwellings(&self, run_id: &str) -> SynPopResult<usize> {
        self.count_for_run("dwelling", run_id)
    }

    pub fn count_vacant_dwellings(&self, run_id: &str) -> SynPopResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dwelling WHERE run_id = ?1 AND household_id IS NULL",
            params![run_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn count_bindings(&self, run_id: &str, purpose: &str, outside: bool) -> SynPopResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM binding WHERE run_id = ?1 AND purpose = ?2 AND outside = ?3",
            params![run_id, purpose, outside as i32],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// `table` is always one of this module's literal table names.
    fn count_for_run(&self, table: &'static str, run_id: &str) -> SynPopResult<usize> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE run_id = ?1"),
            params![run_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}
