//! Monte-Carlo household synthesis and vacant dwellings.

mod common;

use std::collections::HashSet;
use synpop_core::{
    config::SynPopConfig,
    dictionary::Dictionaries,
    error::SynPopError,
    frequency::FrequencyMatrix,
    ids::{AgentIds, IdAllocator, SequentialIds},
    income::IncomeModel,
    microdata::MicroData,
    rng::{RngBank, StageSlot},
    synthesis::{add_vacant_dwellings, PopulationSynthesizer, SynthesisRequest, SynthesisRngs},
    weights::WeightVector,
};

struct World {
    microdata:    MicroData,
    matrix:       FrequencyMatrix,
    dictionaries: Dictionaries,
    income:       IncomeModel,
}

fn world() -> World {
    let microdata = common::microdata();
    let matrix = FrequencyMatrix::build(&microdata, &common::attributes()).expect("matrix");
    World {
        matrix,
        microdata,
        dictionaries: Dictionaries::default_test(),
        income: IncomeModel::new(&SynPopConfig::default_test().income).expect("income"),
    }
}

const ZONES: [(u32, f64); 2] = [(11, 60.0), (12, 40.0)];

#[test]
fn synthesizes_requested_households_with_linked_members() {
    let w = world();
    let synth = PopulationSynthesizer::new(&w.microdata, &w.matrix, &w.dictionaries, &w.income)
        .expect("synthesizer");
    let weights = WeightVector { geography: 1, weights: vec![4.0, 3.0, 2.0, 1.0, 3.0, 2.0, 5.0] };
    let request = SynthesisRequest { geography: 1, household_count: 25, weights: &weights, zone_weights: &ZONES };
    let mut ids = AgentIds::sequential();
    let mut rngs = SynthesisRngs::from_bank(&RngBank::new(42));

    let result = synth.synthesize(&request, &mut ids, &mut rngs).expect("synthesize");
    let pop = &result.population;

    assert_eq!(pop.households.len(), 25);
    assert_eq!(pop.dwellings.len(), 25);
    let expected_persons: u32 = pop.households.iter().map(|h| h.size).sum();
    assert_eq!(pop.persons.len(), expected_persons as usize);

    let household_ids: HashSet<u64> = pop.households.iter().map(|h| h.id).collect();
    assert_eq!(household_ids.len(), 25, "household ids are unique");
    for p in &pop.persons {
        assert!(household_ids.contains(&p.household_id), "person {} is orphaned", p.id);
    }
    for h in &pop.households {
        assert!(ZONES.iter().any(|&(z, _)| z == h.zone), "zone {} outside geography", h.zone);
        assert_ne!(h.micro_record_id, 7, "group-quarters record was drawn");
        let dwelling = pop.dwellings.iter().find(|d| d.id == h.dwelling_id).expect("dwelling");
        assert_eq!(dwelling.household_id, Some(h.id));
        assert_eq!(dwelling.zone, h.zone);
        if h.income_bracket == 90 {
            assert_eq!(h.income, 0.0);
        } else {
            assert_eq!(w.income.bracket_of(h.income), Some(h.income_bracket));
        }
    }

    assert_eq!(result.draws.iter().sum::<f64>(), 25.0);
    assert_eq!(result.draws[6], 0.0);
    assert_eq!(result.realized[0], 25.0, "hh_total counts every drawn household");
}

#[test]
fn residual_weights_spread_draws_over_records() {
    let w = world();
    let synth = PopulationSynthesizer::new(&w.microdata, &w.matrix, &w.dictionaries, &w.income)
        .expect("synthesizer");
    let weights = WeightVector { geography: 1, weights: vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 0.0] };
    let request = SynthesisRequest { geography: 1, household_count: 12, weights: &weights, zone_weights: &ZONES };
    let mut rngs = SynthesisRngs::from_bank(&RngBank::new(3));

    let result = synth.synthesize(&request, &mut AgentIds::sequential(), &mut rngs).expect("synthesize");
    // Mass equals the draw count, so every record is drawn exactly twice.
    for row in 0..6 {
        assert_eq!(result.draws[row], 2.0, "record row {row}");
    }
}

#[test]
fn ids_come_from_the_injected_allocators() {
    let w = world();
    let synth = PopulationSynthesizer::new(&w.microdata, &w.matrix, &w.dictionaries, &w.income)
        .expect("synthesizer");
    let weights = WeightVector::ones(1, w.matrix.record_count());
    let request = SynthesisRequest { geography: 1, household_count: 3, weights: &weights, zone_weights: &ZONES };
    let mut ids = AgentIds::new(
        Box::new(SequentialIds::starting_at(5_000)),
        Box::new(SequentialIds::starting_at(9_000)),
        Box::new(SequentialIds::starting_at(100)),
    );
    let mut rngs = SynthesisRngs::from_bank(&RngBank::new(1));

    let pop = synth.synthesize(&request, &mut ids, &mut rngs).expect("synthesize").population;
    let hh: Vec<u64> = pop.households.iter().map(|h| h.id).collect();
    assert_eq!(hh, vec![5_000, 5_001, 5_002]);
    assert!(pop.persons.iter().all(|p| p.id >= 9_000));
    assert_eq!(ids.households.next(), 5_003);
}

#[test]
fn same_seed_same_population() {
    let w = world();
    let synth = PopulationSynthesizer::new(&w.microdata, &w.matrix, &w.dictionaries, &w.income)
        .expect("synthesizer");
    let weights = WeightVector::ones(1, w.matrix.record_count());
    let request = SynthesisRequest { geography: 1, household_count: 20, weights: &weights, zone_weights: &ZONES };

    let run = || {
        let mut rngs = SynthesisRngs::from_bank(&RngBank::new(99));
        synth
            .synthesize(&request, &mut AgentIds::sequential(), &mut rngs)
            .expect("synthesize")
            .population
    };
    let a = run();
    let b = run();
    let key = |p: &synpop_core::population::SyntheticPopulation| {
        p.households
            .iter()
            .map(|h| (h.micro_record_id, h.zone, h.income.to_bits()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&a), key(&b));
}

#[test]
fn untranslatable_code_aborts_synthesis() {
    let mut microdata = common::microdata();
    for p in microdata.persons.iter_mut() {
        p.gender = 9;
    }
    let matrix = FrequencyMatrix::build(&microdata, &common::attributes()).expect("matrix");
    let dictionaries = Dictionaries::default_test();
    let income = IncomeModel::new(&SynPopConfig::default_test().income).expect("income");
    let synth = PopulationSynthesizer::new(&microdata, &matrix, &dictionaries, &income).expect("synthesizer");
    let weights = WeightVector::ones(1, matrix.record_count());
    let request = SynthesisRequest { geography: 1, household_count: 1, weights: &weights, zone_weights: &ZONES };
    let mut rngs = SynthesisRngs::from_bank(&RngBank::new(1));

    match synth.synthesize(&request, &mut AgentIds::sequential(), &mut rngs) {
        Err(SynPopError::MissingCategory { dictionary, code }) => {
            assert_eq!(dictionary, "gender");
            assert_eq!(code, "9");
        }
        other => panic!("expected MissingCategory, got {:?}", other.map(|r| r.geography)),
    }
}

#[test]
fn diagnostics_compare_realized_counts_with_targets() {
    let w = world();
    let synth = PopulationSynthesizer::new(&w.microdata, &w.matrix, &w.dictionaries, &w.income)
        .expect("synthesizer");
    let targets = common::marginals().municipality.get(1).expect("targets").clone();
    let realized = vec![30.0, 6.0, 20.0, 34.0];

    let diagnostics = synth.diagnose(1, &realized, &targets).expect("diagnose");
    let single = diagnostics.iter().find(|e| e.attribute == "hh_single").expect("hh_single");
    assert_eq!(single.realized, 6.0);
    assert!((single.relative_error.expect("defined") - 3.0 / 9.0).abs() < 1e-12);
    let total = diagnostics.iter().find(|e| e.attribute == "hh_total").expect("hh_total");
    assert_eq!(total.relative_error, Some(0.0));
}

#[test]
fn vacant_dwellings_clone_an_occupied_profile() {
    let w = world();
    let synth = PopulationSynthesizer::new(&w.microdata, &w.matrix, &w.dictionaries, &w.income)
        .expect("synthesizer");
    let weights = WeightVector::ones(1, w.matrix.record_count());
    let request = SynthesisRequest { geography: 1, household_count: 5, weights: &weights, zone_weights: &ZONES };
    let mut ids = AgentIds::sequential();
    let mut rngs = SynthesisRngs::from_bank(&RngBank::new(5));
    let mut pop = synth.synthesize(&request, &mut ids, &mut rngs).expect("synthesize").population;

    let mut rng = RngBank::new(5).for_stage(StageSlot::VacantDwellings);
    let created = add_vacant_dwellings(&mut pop, 1, 4, &mut ids, &mut rng);
    assert_eq!(created, 4);
    assert_eq!(pop.vacant_dwelling_count(), 4);
    assert_eq!(pop.dwellings.len(), 9);
    for vacant in pop.dwellings.iter().filter(|d| d.is_vacant()) {
        assert!(pop.dwellings.iter().any(|d| !d.is_vacant()
            && d.dwelling_type == vacant.dwelling_type
            && d.floor_space == vacant.floor_space
            && d.zone == vacant.zone));
    }

    // No occupied dwelling in geography 2 to clone from.
    assert_eq!(add_vacant_dwellings(&mut pop, 2, 3, &mut ids, &mut rng), 0);
}
