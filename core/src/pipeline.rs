//! The population pipeline.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Calibration          (or reuse of stored weights)
//!   2. Household synthesis  (one pass per municipality, id order)
//!   3. Vacant dwellings
//!   4. Job assignment
//!   5. School assignment    (one pass per configured tier, config order)
//!
//! RULES:
//!   - Each stage reads only what earlier stages produced.
//!   - All randomness flows through the RngBank, one stream per stage.
//!   - Every stage result is recorded in the event log.

use crate::{
    assignment::{assign_jobs, assign_schools, AssignmentReport, Job, School},
    config::SynPopConfig,
    error::{SynPopError, SynPopResult},
    event::{EventLogEntry, PipelineEvent},
    frequency::FrequencyMatrix,
    ids::AgentIds,
    income::IncomeModel,
    inputs::PipelineInputs,
    ipu::{CalibrationReport, IpuSolver},
    population::SyntheticPopulation,
    rng::{RngBank, StageSlot},
    store::SynPopStore,
    synthesis::{add_vacant_dwellings, PopulationSynthesizer, SynthesisRequest, SynthesisRngs},
    types::{GeoId, RunId},
    weights::WeightTable,
};
use std::collections::BTreeSet;

/// Everything one run produced, in memory.
#[derive(Debug)]
pub struct PipelineOutput {
    pub population:          SyntheticPopulation,
    pub jobs:                Vec<Job>,
    pub schools:             Vec<School>,
    pub calibration_reports: Vec<(String, CalibrationReport)>,
    pub assignment_reports:  Vec<AssignmentReport>,
    pub events:              Vec<PipelineEvent>,
}

pub struct Pipeline {
    pub run_id:   RunId,
    pub rng_bank: RngBank,
    config:       SynPopConfig,
    store:        SynPopStore,
    ids:          AgentIds,
    sequence:     u64,
    events:       Vec<PipelineEvent>,
}

impl Pipeline {
    /// The run row must already exist in `store`.
    pub fn new(run_id: RunId, config: SynPopConfig, store: SynPopStore) -> Self {
        Self {
            rng_bank: RngBank::new(config.run.seed),
            run_id,
            config,
            store,
            ids: AgentIds::sequential(),
            sequence: 0,
            events: Vec::new(),
        }
    }

    /// Replace the default sequential id allocators.
    pub fn with_ids(mut self, ids: AgentIds) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &SynPopStore {
        &self.store
    }

    /// Hand the store back, e.g. to start a later run on it.
    pub fn into_store(self) -> SynPopStore {
        self.store
    }

    pub fn run(&mut self, inputs: &PipelineInputs) -> SynPopResult<PipelineOutput> {
        self.emit(
            "pipeline",
            PipelineEvent::RunInitialized { run_id: self.run_id.clone(), seed: self.config.run.seed },
        )?;

        let matrix = FrequencyMatrix::build(&inputs.microdata, &inputs.attributes)?;
        let (weights, calibration_reports) = self.calibrate(inputs, &matrix)?;

        let mut population = self.synthesize(inputs, &matrix, &weights)?;
        self.add_vacancies(inputs, &mut population)?;
        self.store.insert_population(&self.run_id, &population)?;

        let mut jobs = inputs.jobs.clone();
        let mut schools = inputs.schools.clone();
        let mut assignment_reports = Vec::new();
        assignment_reports.push(self.assign_jobs(inputs, &mut population, &mut jobs)?);
        assignment_reports.extend(self.assign_schools(inputs, &mut population, &mut schools)?);

        self.emit(
            "pipeline",
            PipelineEvent::RunCompleted {
                households: population.households.len(),
                persons:    population.persons.len(),
                dwellings:  population.dwellings.len(),
            },
        )?;
        self.store.complete_run(&self.run_id)?;

        Ok(PipelineOutput {
            population,
            jobs,
            schools,
            calibration_reports,
            assignment_reports,
            events: std::mem::take(&mut self.events),
        })
    }

    // ── Stage 1: calibration ───────────────────────────────────

    fn calibrate(
        &mut self,
        inputs: &PipelineInputs,
        matrix: &FrequencyMatrix,
    ) -> SynPopResult<(WeightTable, Vec<(String, CalibrationReport)>)> {
        let key = self.config.run.weights_key.clone();
        let needed: BTreeSet<GeoId> = inputs.household_counts.keys().copied().collect();

        if self.config.run.reuse_weights {
            if let Some(stored) = self.store.load_weights(&key)? {
                if Self::covers(&stored, &needed, matrix.record_count()) {
                    self.emit(
                        "calibration",
                        PipelineEvent::WeightsReused { weights_key: key, geographies: stored.len() },
                    )?;
                    return Ok((stored, Vec::new()));
                }
                log::warn!("stored weights '{key}' do not fit this micro sample, recalibrating");
            }
        }

        let solver = IpuSolver::new(matrix, &self.config.ipu);
        let municipal = &inputs.marginals.municipality;
        let targets_of = |geo: GeoId| {
            municipal.get(geo).ok_or_else(|| {
                SynPopError::Other(anyhow::anyhow!("no marginal targets for municipality {geo}"))
            })
        };

        let mut weights = WeightTable::default();
        let mut reports = Vec::new();
        let mut nested: BTreeSet<GeoId> = BTreeSet::new();

        for (region, members) in inputs.geography.regions() {
            let Some(region_targets) = inputs.marginals.region.get(region) else { continue };
            let members: Vec<GeoId> = members.into_iter().filter(|g| needed.contains(g)).collect();
            if members.is_empty() {
                continue;
            }
            let muni_targets = members
                .iter()
                .map(|&g| Ok((g, targets_of(g)?)))
                .collect::<SynPopResult<Vec<_>>>()?;
            let calibration = solver.calibrate_nested(region, region_targets, &muni_targets)?;
            nested.extend(members);
            weights.merge(calibration.weights);
            reports.push((format!("region={region}"), calibration.report));
        }

        for &geo in needed.difference(&nested) {
            let calibration = solver.calibrate(geo, targets_of(geo)?)?;
            weights.merge(calibration.weights);
            reports.push((format!("geo={geo}"), calibration.report));
        }

        self.store.save_weights(&key, &weights, matrix)?;
        for (scope, report) in &reports {
            self.store.insert_calibration_errors(&self.run_id, &report.attribute_errors)?;
            self.emit(
                "calibration",
                PipelineEvent::CalibrationCompleted {
                    scope:       scope.clone(),
                    iterations:  report.iterations,
                    best_error:  report.best_error,
                    termination: report.termination.as_str().to_string(),
                },
            )?;
        }
        Ok((weights, reports))
    }

    fn covers(table: &WeightTable, needed: &BTreeSet<GeoId>, records: usize) -> bool {
        needed
            .iter()
            .all(|&g| table.get(g).map(|v| v.weights.len() == records).unwrap_or(false))
    }

    // ── Stage 2: synthesis ─────────────────────────────────────

    fn synthesize(
        &mut self,
        inputs: &PipelineInputs,
        matrix: &FrequencyMatrix,
        weights: &WeightTable,
    ) -> SynPopResult<SyntheticPopulation> {
        let income = IncomeModel::new(&self.config.income)?;
        let synthesizer =
            PopulationSynthesizer::new(&inputs.microdata, matrix, &inputs.dictionaries, &income)?;
        let mut rngs = SynthesisRngs::from_bank(&self.rng_bank);
        let mut population = SyntheticPopulation::default();

        for (&geo, &household_count) in &inputs.household_counts {
            let zone_weights: Vec<_> = inputs
                .geography
                .zones_of(geo)?
                .iter()
                .map(|&z| (z, inputs.zone_weights.get(&z).copied().unwrap_or(0.0)))
                .collect();
            let request = SynthesisRequest {
                geography: geo,
                household_count,
                weights: weights.get(geo)?,
                zone_weights: &zone_weights,
            };
            let result = synthesizer.synthesize(&request, &mut self.ids, &mut rngs)?;

            if let Some(targets) = inputs.marginals.municipality.get(geo) {
                let diagnostics = synthesizer.diagnose(geo, &result.realized, targets)?;
                self.store.insert_synthesis_diagnostics(&self.run_id, &diagnostics)?;
            }
            self.emit(
                "synthesis",
                PipelineEvent::GeographySynthesized {
                    geography:  geo,
                    households: result.population.households.len(),
                    persons:    result.population.persons.len(),
                    dwellings:  result.population.dwellings.len(),
                },
            )?;
            population.extend(result.population);
        }
        Ok(population)
    }

    // ── Stage 3: vacant dwellings ──────────────────────────────

    fn add_vacancies(
        &mut self,
        inputs: &PipelineInputs,
        population: &mut SyntheticPopulation,
    ) -> SynPopResult<()> {
        let mut rng = self.rng_bank.for_stage(StageSlot::VacantDwellings);
        for (&geo, &requested) in &inputs.vacant_dwellings {
            let created = add_vacant_dwellings(population, geo, requested, &mut self.ids, &mut rng);
            self.emit(
                "vacant_dwellings",
                PipelineEvent::VacantDwellingsAdded { geography: geo, requested, created },
            )?;
        }
        Ok(())
    }

    // ── Stage 4/5: assignment ──────────────────────────────────

    fn assign_jobs(
        &mut self,
        inputs: &PipelineInputs,
        population: &mut SyntheticPopulation,
        jobs: &mut [Job],
    ) -> SynPopResult<AssignmentReport> {
        let mut rng = self.rng_bank.for_stage(StageSlot::JobAssignment);
        let outcome = assign_jobs(
            &mut population.persons,
            jobs,
            &inputs.distances,
            &self.config.assignment,
            &inputs.job_type_probabilities,
            &mut rng,
        )?;
        self.store.insert_bindings(&self.run_id, "job", &outcome.bindings)?;
        self.store.insert_trip_lengths(&self.run_id, &outcome.report.label, &outcome.trip_lengths)?;
        self.store.insert_od_flows(&self.run_id, &outcome.report.label, &outcome.od_flows)?;
        self.emit("jobs", Self::assignment_event(&outcome.report))?;
        Ok(outcome.report)
    }

    fn assign_schools(
        &mut self,
        inputs: &PipelineInputs,
        population: &mut SyntheticPopulation,
        schools: &mut [School],
    ) -> SynPopResult<Vec<AssignmentReport>> {
        let mut rng = self.rng_bank.for_stage(StageSlot::SchoolAssignment);
        let tiers = self.config.assignment.school_tiers.clone();
        let mut reports = Vec::with_capacity(tiers.len());
        for tier in &tiers {
            let outcome = assign_schools(
                &mut population.persons,
                schools,
                &inputs.distances,
                &self.config.assignment,
                tier,
                &mut rng,
            )?;
            self.store.insert_bindings(&self.run_id, "school", &outcome.bindings)?;
            self.store.insert_trip_lengths(&self.run_id, &outcome.report.label, &outcome.trip_lengths)?;
            self.store.insert_od_flows(&self.run_id, &outcome.report.label, &outcome.od_flows)?;
            self.emit("schools", Self::assignment_event(&outcome.report))?;
            reports.push(outcome.report);
        }
        Ok(reports)
    }

    fn assignment_event(report: &AssignmentReport) -> PipelineEvent {
        PipelineEvent::AssignmentCompleted {
            label:            report.label.clone(),
            requested:        report.requested,
            assigned:         report.assigned,
            outside:          report.outside,
            remaining_vacant: report.remaining_vacant,
        }
    }

    /// Record an event in memory and in the event log.
    fn emit(&mut self, stage: &str, event: PipelineEvent) -> SynPopResult<()> {
        let entry = EventLogEntry {
            id:         None,
            run_id:     self.run_id.clone(),
            sequence:   self.sequence,
            stage:      stage.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(&event)?,
        };
        self.store.append_event(&entry)?;
        self.sequence += 1;
        self.events.push(event);
        Ok(())
    }
}
