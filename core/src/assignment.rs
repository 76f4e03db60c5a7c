//! Gravity-model assignment of workers to jobs and students to schools.
//!
//! Candidates are shuffled, then processed one at a time. For a candidate's
//! required type, every zone still holding a vacancy of that type gets the
//! weight `impedance(origin, zone) × vacancies(zone)` (or the zone's fixed
//! capacity in the coarse variant), one weighted draw picks the destination
//! and the zone's last vacant id is taken. A type with no vacancy left
//! routes the candidate to the outside sentinel; that is final.

use crate::{
    categories::{JobType, SchoolType},
    config::{AssignmentConfig, SchoolTierConfig},
    diagnostics::{OdFlows, TripLengthHistogram},
    dictionary::JobTypeProbabilities,
    error::{SynPopError, SynPopResult},
    impedance::{DecayFunction, DistanceMatrix, ImpedanceMatrix},
    population::{Binding, SyntheticPerson},
    rng::StageRng,
    types::{JobId, PersonId, SchoolId, ZoneId},
    vacancy::VacancyCatalogue,
};
use rand::{
    distributions::{Distribution, WeightedError, WeightedIndex},
    seq::SliceRandom,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// How a destination zone's attraction is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Current vacancy count; shrinks as seats are taken.
    #[default]
    VacancyWeighted,
    /// Total capacity registered at build time; never decremented.
    CapacityWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id:       JobId,
    pub zone:     ZoneId,
    pub job_type: JobType,
    #[serde(default)]
    pub worker:   Option<PersonId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id:          SchoolId,
    pub zone:        ZoneId,
    pub school_type: SchoolType,
    pub capacity:    u32,
    #[serde(default)]
    pub occupancy:   u32,
}

/// A person waiting for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub person: PersonId,
    pub origin: ZoneId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub label:            String,
    pub requested:        usize,
    pub assigned:         usize,
    pub outside:          usize,
    pub initial_vacant:   usize,
    pub remaining_vacant: usize,
}

impl AssignmentReport {
    /// Every candidate ends assigned or outside, and every taken vacancy
    /// is one assignment.
    pub fn is_conserved(&self) -> bool {
        self.assigned + self.outside == self.requested
            && self.assigned + self.remaining_vacant == self.initial_vacant
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentOutcome<K> {
    pub bindings:     Vec<(PersonId, Option<K>, Binding)>,
    pub report:       AssignmentReport,
    pub trip_lengths: TripLengthHistogram,
    pub od_flows:     OdFlows,
}

pub struct AssignmentEngine<'a, K: Ord> {
    label:      String,
    distances:  &'a DistanceMatrix,
    impedance:  ImpedanceMatrix,
    mode:       SelectionMode,
    catalogue:  VacancyCatalogue<K>,
    bin_width:  f64,
    bins:       usize,
}

impl<'a, K: Copy + Ord + Debug> AssignmentEngine<'a, K> {
    pub fn new(
        label: &str,
        distances: &'a DistanceMatrix,
        decay: DecayFunction,
        mode: SelectionMode,
        catalogue: VacancyCatalogue<K>,
    ) -> Self {
        Self {
            label: label.to_string(),
            distances,
            impedance: ImpedanceMatrix::compute(distances, decay),
            mode,
            catalogue,
            bin_width: 1.0,
            bins: 100,
        }
    }

    pub fn with_histogram(mut self, bin_width: f64, bins: usize) -> Self {
        self.bin_width = bin_width;
        self.bins = bins;
        self
    }

    pub fn catalogue(&self) -> &VacancyCatalogue<K> {
        &self.catalogue
    }

    /// Shuffle `candidates` and bind each one. `required` names the type a
    /// candidate needs; it is called in processing order with the same RNG.
    pub fn run<F>(
        &mut self,
        mut candidates: Vec<Candidate>,
        rng: &mut StageRng,
        mut required: F,
    ) -> SynPopResult<AssignmentOutcome<K>>
    where
        F: FnMut(&Candidate, &mut StageRng) -> SynPopResult<K>,
    {
        candidates.shuffle(rng);

        let mut report = AssignmentReport {
            label: self.label.clone(),
            requested: candidates.len(),
            initial_vacant: self.catalogue.total_remaining(),
            ..AssignmentReport::default()
        };
        let mut trip_lengths = TripLengthHistogram::new(self.bin_width, self.bins);
        let mut od_flows = OdFlows::default();
        let mut bindings = Vec::with_capacity(candidates.len());
        let mut attraction: Vec<f64> = Vec::new();

        for candidate in &candidates {
            let kind = required(candidate, rng)?;
            let origin = self.distances.index_of(candidate.origin)?;

            let Some(slot) = self.pick_slot(kind, origin, &mut attraction, rng) else {
                report.outside += 1;
                bindings.push((candidate.person, Some(kind), Binding::Outside));
                continue;
            };
            let (zone, entity) = self.catalogue.take(kind, slot).ok_or_else(|| {
                SynPopError::Other(anyhow::anyhow!("{}: active slot {slot} of {kind:?} vanished", self.label))
            })?;
            let destination = self.distances.index_of(zone)?;

            trip_lengths.record(self.distances.by_index(origin, destination));
            od_flows.record(candidate.origin, zone);
            report.assigned += 1;
            bindings.push((candidate.person, Some(kind), Binding::Assigned { zone, entity }));
        }

        report.remaining_vacant = self.catalogue.total_remaining();
        if report.outside > 0 {
            log::warn!(
                "{} assignment: {} of {} persons routed outside the study area",
                self.label,
                report.outside,
                report.requested
            );
        }
        log::info!(
            "{} assignment: requested={} assigned={} outside={} remaining_vacant={}",
            self.label,
            report.requested,
            report.assigned,
            report.outside,
            report.remaining_vacant
        );

        Ok(AssignmentOutcome { bindings, report, trip_lengths, od_flows })
    }

    /// One weighted draw over the active zones of `kind`.
    fn pick_slot(
        &self,
        kind: K,
        origin: usize,
        attraction: &mut Vec<f64>,
        rng: &mut StageRng,
    ) -> Option<usize> {
        let zones = self.catalogue.get(kind)?.active_zones();
        attraction.clear();
        attraction.extend(zones.iter().map(|z| {
            let size = match self.mode {
                SelectionMode::VacancyWeighted => z.count(),
                SelectionMode::CapacityWeighted => z.capacity,
            };
            self.impedance.by_index(origin, z.matrix_index) * size as f64
        }));

        let total: f64 = attraction.iter().sum();
        if !total.is_finite() {
            // Impedance overflow; every active zone stays reachable.
            return Some(rng.next_index_below(zones.len()));
        }
        match WeightedIndex::new(attraction.iter()) {
            Ok(dist) => Some(dist.sample(rng)),
            Err(WeightedError::NoItem) => None,
            // Impedance underflow; every active zone stays reachable.
            Err(_) => Some(rng.next_index_below(zones.len())),
        }
    }
}

/// Catalogue of jobs without a worker, keyed by job type.
pub fn job_catalogue(jobs: &[Job], distances: &DistanceMatrix) -> SynPopResult<VacancyCatalogue<JobType>> {
    let mut catalogue = VacancyCatalogue::new();
    for job in jobs.iter().filter(|j| j.worker.is_none()) {
        catalogue.insert(job.job_type, job.zone, distances.index_of(job.zone)?, job.id);
    }
    Ok(catalogue)
}

/// Catalogue of free seats of one school tier; one entry per free seat.
pub fn school_catalogue(
    schools: &[School],
    school_type: SchoolType,
    distances: &DistanceMatrix,
) -> SynPopResult<VacancyCatalogue<SchoolType>> {
    let mut catalogue = VacancyCatalogue::new();
    for school in schools.iter().filter(|s| s.school_type == school_type) {
        let index = distances.index_of(school.zone)?;
        for _ in 0..school.capacity.saturating_sub(school.occupancy) {
            catalogue.insert(school_type, school.zone, index, school.id);
        }
    }
    Ok(catalogue)
}

/// Bind every employed person to a job and write the binding back onto
/// both the person and the job.
pub fn assign_jobs(
    persons: &mut [SyntheticPerson],
    jobs: &mut [Job],
    distances: &DistanceMatrix,
    config: &AssignmentConfig,
    probabilities: &JobTypeProbabilities,
    rng: &mut StageRng,
) -> SynPopResult<AssignmentOutcome<JobType>> {
    let profiles: HashMap<PersonId, &SyntheticPerson> =
        persons.iter().filter(|p| p.is_employed()).map(|p| (p.id, p)).collect();
    let candidates: Vec<Candidate> = persons
        .iter()
        .filter(|p| p.is_employed())
        .map(|p| Candidate { person: p.id, origin: p.zone })
        .collect();

    let catalogue = job_catalogue(jobs, distances)?;
    let mut engine = AssignmentEngine::new("jobs", distances, config.job_decay, config.job_selection, catalogue)
        .with_histogram(config.trip_length_bin, config.trip_length_bins);
    let outcome = engine.run(candidates, rng, |c, rng| {
        let p = profiles[&c.person];
        probabilities.sample(p.gender, p.education, rng)
    })?;
    drop(profiles);

    let job_index: HashMap<JobId, usize> = jobs.iter().enumerate().map(|(i, j)| (j.id, i)).collect();
    let person_index: HashMap<PersonId, usize> =
        persons.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
    for (person, _, binding) in &outcome.bindings {
        persons[person_index[person]].workplace = Some(*binding);
        if let Binding::Assigned { entity, .. } = binding {
            let i = job_index.get(entity).copied().ok_or_else(|| {
                SynPopError::Other(anyhow::anyhow!("job {entity} bound but not in inventory"))
            })?;
            jobs[i].worker = Some(*person);
        }
    }
    Ok(outcome)
}

/// Bind every person attending `tier.school_type` to a school seat.
pub fn assign_schools(
    persons: &mut [SyntheticPerson],
    schools: &mut [School],
    distances: &DistanceMatrix,
    config: &AssignmentConfig,
    tier: &SchoolTierConfig,
    rng: &mut StageRng,
) -> SynPopResult<AssignmentOutcome<SchoolType>> {
    let school_type = tier.school_type;
    let candidates: Vec<Candidate> = persons
        .iter()
        .filter(|p| p.school_type == Some(school_type))
        .map(|p| Candidate { person: p.id, origin: p.zone })
        .collect();

    let catalogue = school_catalogue(schools, school_type, distances)?;
    let label = format!("schools/{school_type}");
    let mut engine = AssignmentEngine::new(&label, distances, tier.decay, tier.selection, catalogue)
        .with_histogram(config.trip_length_bin, config.trip_length_bins);
    let outcome = engine.run(candidates, rng, |_, _| Ok(school_type))?;

    let school_index: HashMap<SchoolId, usize> =
        schools.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
    let person_index: HashMap<PersonId, usize> =
        persons.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
    for (person, _, binding) in &outcome.bindings {
        persons[person_index[person]].school = Some(*binding);
        if let Binding::Assigned { entity, .. } = binding {
            let i = school_index.get(entity).copied().ok_or_else(|| {
                SynPopError::Other(anyhow::anyhow!("school {entity} bound but not in inventory"))
            })?;
            schools[i].occupancy += 1;
        }
    }
    Ok(outcome)
}
