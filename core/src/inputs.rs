//! External tables the pipeline consumes, already parsed.
//!
//! Everything here is read-only for the whole run. `load` reads the JSON
//! extracts under `<data_dir>/inputs/`; tests build the struct directly.

use crate::{
    assignment::{Job, School},
    dictionary::{Dictionaries, JobTypeProbabilities, JobTypeRow},
    error::{SynPopError, SynPopResult},
    frequency::AttributeSpec,
    geography::{Geography, Marginals, Municipality},
    impedance::DistanceMatrix,
    microdata::{MicroData, MicroHouseholdRecord, MicroPersonRecord},
    types::{GeoId, ZoneId},
};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::BTreeMap;

/// On-disk shape of the distance skim.
#[derive(Debug, Deserialize)]
struct DistanceFile {
    zones: Vec<ZoneId>,
    rows:  Vec<Vec<f64>>,
}

pub struct PipelineInputs {
    pub microdata:              MicroData,
    pub attributes:             Vec<AttributeSpec>,
    pub marginals:              Marginals,
    pub geography:              Geography,
    /// Population weight of every zone, used for household placement.
    pub zone_weights:           BTreeMap<ZoneId, f64>,
    /// Households to synthesize per municipality.
    pub household_counts:       BTreeMap<GeoId, usize>,
    /// Vacant dwellings to add per municipality.
    pub vacant_dwellings:       BTreeMap<GeoId, usize>,
    pub distances:              DistanceMatrix,
    pub jobs:                   Vec<Job>,
    pub schools:                Vec<School>,
    pub dictionaries:           Dictionaries,
    pub job_type_probabilities: JobTypeProbabilities,
}

fn read_json<T: DeserializeOwned>(dir: &str, file: &str) -> anyhow::Result<T> {
    let path = format!("{dir}/{file}");
    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

impl PipelineInputs {
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let dir = format!("{data_dir}/inputs");
        let households: Vec<MicroHouseholdRecord> = read_json(&dir, "micro_households.json")?;
        let persons: Vec<MicroPersonRecord> = read_json(&dir, "micro_persons.json")?;
        let municipalities: Vec<Municipality> = read_json(&dir, "geography.json")?;
        let distances: DistanceFile = read_json(&dir, "distances.json")?;
        let job_rows: Vec<JobTypeRow> = read_json(&dir, "job_type_probabilities.json")?;

        let inputs = Self {
            microdata:              MicroData::new(households, persons)?,
            attributes:             read_json(&dir, "attributes.json")?,
            marginals:              read_json(&dir, "marginals.json")?,
            geography:              Geography::new(municipalities),
            zone_weights:           read_json(&dir, "zone_weights.json")?,
            household_counts:       read_json(&dir, "household_counts.json")?,
            vacant_dwellings:       read_json(&dir, "vacant_dwellings.json")?,
            distances:              DistanceMatrix::from_rows(distances.zones, distances.rows)?,
            jobs:                   read_json(&dir, "jobs.json")?,
            schools:                read_json(&dir, "schools.json")?,
            dictionaries:           read_json(&dir, "dictionaries.json")?,
            job_type_probabilities: JobTypeProbabilities::from_rows(job_rows),
        };
        inputs.validate()?;
        log::info!(
            "loaded inputs from {dir}: {} micro households, {} municipalities, {} zones, {} jobs, {} schools",
            inputs.microdata.household_count(),
            inputs.geography.municipality_ids().count(),
            inputs.distances.zone_count(),
            inputs.jobs.len(),
            inputs.schools.len()
        );
        Ok(inputs)
    }

    /// Cross-table consistency: every referenced zone and geography exists.
    pub fn validate(&self) -> SynPopResult<()> {
        self.microdata.validate()?;

        for geo in self.geography.municipality_ids() {
            for &zone in self.geography.zones_of(geo)? {
                self.require_zone(zone, &format!("zones of municipality {geo}"))?;
            }
        }
        for &zone in self.zone_weights.keys() {
            if self.geography.municipality_of_zone(zone).is_none() {
                return Err(SynPopError::UnknownZone { zone, context: "zone weights".into() });
            }
        }
        for &geo in self.household_counts.keys().chain(self.vacant_dwellings.keys()) {
            self.geography.municipality(geo)?;
        }
        for &geo in self.marginals.municipality.targets.keys() {
            self.geography.municipality(geo)?;
        }
        for job in &self.jobs {
            self.require_zone(job.zone, &format!("job {}", job.id))?;
        }
        for school in &self.schools {
            self.require_zone(school.zone, &format!("school {}", school.id))?;
        }
        Ok(())
    }

    fn require_zone(&self, zone: ZoneId, context: &str) -> SynPopResult<()> {
        self.distances
            .index_of(zone)
            .map(|_| ())
            .map_err(|_| SynPopError::UnknownZone { zone, context: context.to_string() })
    }
}
