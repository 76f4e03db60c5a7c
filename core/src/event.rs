//! Pipeline events: the audit trail of one run.
//!
//! RULE: Every stage reports what it did as events, and every event is
//! persisted to the event log before the next stage starts.

use crate::types::{GeoId, RunId};
use serde::{Deserialize, Serialize};

/// Variants are only ever appended; the `type` tag is stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunInitialized {
        run_id: RunId,
        seed:   u64,
    },

    // ── Calibration ────────────────────────────────
    CalibrationCompleted {
        scope:       String,
        iterations:  u32,
        best_error:  f64,
        termination: String,
    },
    WeightsReused {
        weights_key: String,
        geographies: usize,
    },

    // ── Synthesis ──────────────────────────────────
    GeographySynthesized {
        geography:  GeoId,
        households: usize,
        persons:    usize,
        dwellings:  usize,
    },
    VacantDwellingsAdded {
        geography: GeoId,
        requested: usize,
        created:   usize,
    },

    // ── Assignment ─────────────────────────────────
    AssignmentCompleted {
        label:            String,
        requested:        usize,
        assigned:         usize,
        outside:          usize,
        remaining_vacant: usize,
    },

    RunCompleted {
        households: usize,
        persons:    usize,
        dwellings:  usize,
    },
}

impl PipelineEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }       => "run_initialized",
            Self::CalibrationCompleted { .. } => "calibration_completed",
            Self::WeightsReused { .. }        => "weights_reused",
            Self::GeographySynthesized { .. } => "geography_synthesized",
            Self::VacantDwellingsAdded { .. } => "vacant_dwellings_added",
            Self::AssignmentCompleted { .. }  => "assignment_completed",
            Self::RunCompleted { .. }         => "run_completed",
        }
    }
}

/// Row of the event_log table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    /// Position of the event within the run.
    pub sequence:   u64,
    pub stage:      String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized PipelineEvent
}

impl EventLogEntry {
    pub fn decode(&self) -> serde_json::Result<PipelineEvent> {
        serde_json::from_str(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_type_tag() {
        let event = PipelineEvent::VacantDwellingsAdded { geography: 7, requested: 3, created: 3 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"vacant_dwellings_added\""), "got {json}");
        assert_eq!(event.type_name(), "vacant_dwellings_added");
    }
}
