//! Monte-Carlo population synthesis.
//!
//! For one geography: draw micro household records in proportion to their
//! calibrated weights, place each drawn household in a zone in proportion to
//! zone population weights, and materialize households, persons and
//! dwellings with freshly allocated ids.
//!
//! Both draws use residual weights (see `sampling`): a drawn record loses
//! one unit of weight, a drawn zone loses the household's size.

use crate::{
    dictionary::Dictionaries,
    error::{SynPopError, SynPopResult},
    frequency::FrequencyMatrix,
    geography::AttributeTargets,
    ids::AgentIds,
    income::IncomeModel,
    microdata::MicroData,
    population::{SyntheticDwelling, SyntheticHousehold, SyntheticPerson, SyntheticPopulation},
    rng::{RngBank, StageRng, StageSlot},
    sampling::ResidualSampler,
    types::{GeoId, RecordIndex, ZoneId},
    weights::WeightVector,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The RNG streams one synthesis run draws from.
pub struct SynthesisRngs {
    pub selection: StageRng,
    pub zones:     StageRng,
    pub income:    StageRng,
}

impl SynthesisRngs {
    pub fn from_bank(bank: &RngBank) -> Self {
        Self {
            selection: bank.for_stage(StageSlot::HouseholdSelection),
            zones:     bank.for_stage(StageSlot::ZonePlacement),
            income:    bank.for_stage(StageSlot::Income),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub geography:       GeoId,
    pub household_count: usize,
    pub weights:         &'a WeightVector,
    /// Population weight of every zone in the geography.
    pub zone_weights:    &'a [(ZoneId, f64)],
}

/// Realized versus targeted count of one attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisDiagnostic {
    pub geography:      GeoId,
    pub attribute:      String,
    pub target:         f64,
    pub realized:       f64,
    pub relative_error: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct GeographyPopulation {
    pub geography:    GeoId,
    pub population:   SyntheticPopulation,
    /// Times each frequency-matrix row was drawn.
    pub draws:        Vec<f64>,
    /// Realized attribute counts, in frequency-matrix column order.
    pub realized:     Vec<f64>,
}

pub struct PopulationSynthesizer<'a> {
    microdata:    &'a MicroData,
    matrix:       &'a FrequencyMatrix,
    dictionaries: &'a Dictionaries,
    income:       &'a IncomeModel,
    /// Frequency-matrix row → micro household index.
    row_to_micro: Vec<RecordIndex>,
}

impl<'a> PopulationSynthesizer<'a> {
    pub fn new(
        microdata: &'a MicroData,
        matrix: &'a FrequencyMatrix,
        dictionaries: &'a Dictionaries,
        income: &'a IncomeModel,
    ) -> SynPopResult<Self> {
        let by_id: HashMap<u32, RecordIndex> = microdata
            .households
            .iter()
            .enumerate()
            .map(|(i, h)| (h.id, i))
            .collect();
        let row_to_micro = (0..matrix.record_count())
            .map(|row| {
                let id = matrix.record_id(row);
                by_id.get(&id).copied().ok_or_else(|| {
                    SynPopError::Other(anyhow::anyhow!(
                        "frequency row {row} refers to unknown micro household {id}"
                    ))
                })
            })
            .collect::<SynPopResult<Vec<_>>>()?;
        Ok(Self { microdata, matrix, dictionaries, income, row_to_micro })
    }

    pub fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        ids: &mut AgentIds,
        rngs: &mut SynthesisRngs,
    ) -> SynPopResult<GeographyPopulation> {
        let geo = request.geography;
        let weights = &request.weights.weights;
        if weights.len() != self.matrix.record_count() {
            return Err(SynPopError::ShapeMismatch {
                context: format!("weights of geo {geo}"),
                expected: self.matrix.record_count(),
                actual: weights.len(),
            });
        }
        if request.zone_weights.is_empty() {
            return Err(anyhow::anyhow!("geo={geo} has no zones to place households in").into());
        }

        let mut records =
            ResidualSampler::with_eligibility(weights, |row| !self.matrix.is_group_quarters(row));
        if request.household_count > 0 && !records.has_eligible() {
            return Err(anyhow::anyhow!(
                "geo={geo} needs {} households but has no private household records",
                request.household_count
            )
            .into());
        }
        let zone_mass: Vec<f64> = request.zone_weights.iter().map(|&(_, w)| w).collect();
        let mut zones = ResidualSampler::new(&zone_mass);

        let mut population = SyntheticPopulation::default();
        let mut draws = vec![0.0; self.matrix.record_count()];

        for _ in 0..request.household_count {
            let row = records
                .draw(&mut rngs.selection)
                .ok_or_else(|| anyhow::anyhow!("geo={geo}: household draw failed"))?;
            records.consume(row, 1.0);
            draws[row] += 1.0;

            let micro_index = self.row_to_micro[row];
            let size = self.microdata.household(micro_index).size;

            let zone_index = zones
                .draw(&mut rngs.zones)
                .ok_or_else(|| anyhow::anyhow!("geo={geo}: zone draw failed"))?;
            zones.consume(zone_index, size as f64);
            let zone = request.zone_weights[zone_index].0;

            self.materialize(geo, zone, micro_index, ids, &mut rngs.income, &mut population)?;
        }

        let realized = self.matrix.weighted_sums(&draws);
        log::info!(
            "geo={geo} synthesis: {} households, {} persons, {} dwellings",
            population.households.len(),
            population.persons.len(),
            population.dwellings.len()
        );

        Ok(GeographyPopulation { geography: geo, population, draws, realized })
    }

    fn materialize(
        &self,
        geo: GeoId,
        zone: ZoneId,
        micro_index: RecordIndex,
        ids: &mut AgentIds,
        income_rng: &mut StageRng,
        out: &mut SyntheticPopulation,
    ) -> SynPopResult<()> {
        let record = self.microdata.household(micro_index);
        let household_id = ids.households.next();
        let dwelling_id = ids.dwellings.next();
        let income = self.income.sample(record.income_bracket, income_rng)?;

        for p in self.microdata.persons_of(micro_index) {
            let d = self.dictionaries;
            let job_sector = match p.job_sector {
                0 => None,
                code => Some(d.job_sector.translate(code)?),
            };
            let school_type = match p.school_type {
                0 => None,
                code => Some(d.school_type.translate(code)?),
            };
            out.persons.push(SyntheticPerson {
                id: ids.persons.next(),
                household_id,
                zone,
                micro_record_id: p.id,
                age: p.age,
                gender: d.gender.translate(p.gender)?,
                occupation: d.occupation.translate(p.occupation)?,
                nationality: p.nationality,
                job_sector,
                education: d.education.translate(p.education)?,
                school_type,
                workplace: None,
                school: None,
            });
        }

        out.households.push(SyntheticHousehold {
            id: household_id,
            geography: geo,
            zone,
            dwelling_id,
            micro_record_id: record.id,
            size: record.size,
            income_bracket: record.income_bracket,
            income,
        });
        out.dwellings.push(SyntheticDwelling {
            id: dwelling_id,
            geography: geo,
            zone,
            household_id: Some(household_id),
            dwelling_type: record.dwelling_type,
            usage: record.dwelling_usage,
            year_bracket: record.dwelling_year,
            floor_space: record.floor_space,
        });
        Ok(())
    }

    /// Compare realized counts against the geography's targets.
    pub fn diagnose(
        &self,
        geo: GeoId,
        realized: &[f64],
        targets: &AttributeTargets,
    ) -> SynPopResult<Vec<SynthesisDiagnostic>> {
        targets
            .iter()
            .map(|(name, &target)| {
                let attr = self.matrix.attribute_index(name)?;
                let got = realized[attr];
                Ok(SynthesisDiagnostic {
                    geography: geo,
                    attribute: name.clone(),
                    target,
                    realized: got,
                    relative_error: (target > 0.0).then(|| (got - target).abs() / target),
                })
            })
            .collect()
    }
}

/// Append `count` vacant dwellings, each cloning the profile of a randomly
/// chosen dwelling already generated for the geography. Returns how many
/// were created; zero when there is nothing to clone from.
pub fn add_vacant_dwellings(
    population: &mut SyntheticPopulation,
    geo: GeoId,
    count: usize,
    ids: &mut AgentIds,
    rng: &mut StageRng,
) -> usize {
    let templates: Vec<usize> = population
        .dwellings
        .iter()
        .enumerate()
        .filter(|(_, d)| d.geography == geo && !d.is_vacant())
        .map(|(i, _)| i)
        .collect();
    if count == 0 {
        return 0;
    }
    if templates.is_empty() {
        log::warn!("geo={geo} vacant dwellings: no occupied dwelling to clone, skipping {count}");
        return 0;
    }

    for _ in 0..count {
        let template = &population.dwellings[templates[rng.next_index_below(templates.len())]];
        let vacant = SyntheticDwelling {
            id: ids.dwellings.next(),
            household_id: None,
            ..template.clone()
        };
        population.dwellings.push(vacant);
    }
    log::debug!("geo={geo} vacant dwellings: created {count}");
    count
}
