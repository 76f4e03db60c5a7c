//! Small two-municipality world shared by the pipeline tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use synpop_core::{
    assignment::{Job, School},
    categories::{EducationLevel, Gender, JobType, SchoolType},
    dictionary::{Dictionaries, JobTypeProbabilities, JobTypeRow},
    frequency::{AttributeLevel, AttributeSpec, Matcher},
    geography::{AttributeTargets, Geography, MarginalTable, Marginals, Municipality},
    impedance::DistanceMatrix,
    inputs::PipelineInputs,
    microdata::{HouseholdField, MicroData, MicroHouseholdRecord, MicroPersonRecord, PersonField},
    store::SynPopStore,
};

pub fn store_with_run(run_id: &str, seed: u64) -> SynPopStore {
    let store = SynPopStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store.insert_run(run_id, seed, "test", "0.1.0-test").expect("insert run");
    store
}

fn household(id: u32, size: u32, income_bracket: i32, first_person: usize) -> MicroHouseholdRecord {
    MicroHouseholdRecord {
        id,
        size,
        group_quarters: false,
        income_bracket,
        dwelling_type: 1 + (id as i32 % 3),
        dwelling_usage: 1,
        dwelling_year: 2,
        floor_space: 60 + 10 * size as i32,
        first_person,
    }
}

/// (age, gender, occupation, education, job sector, school type)
fn person(id: u32, household_id: u32, p: (u32, i32, i32, i32, i32, i32)) -> MicroPersonRecord {
    MicroPersonRecord {
        id,
        household_id,
        age: p.0,
        gender: p.1,
        occupation: p.2,
        nationality: 1,
        job_sector: p.4,
        education: p.3,
        school_type: p.5,
    }
}

pub fn microdata() -> MicroData {
    let layout: Vec<(u32, i32, bool, Vec<(u32, i32, i32, i32, i32, i32)>)> = vec![
        (1, 1, false, vec![(30, 1, 1, 2, 10, 0)]),
        (2, 3, false, vec![(40, 2, 1, 3, 7, 0), (10, 1, 4, 1, 0, 1)]),
        (3, 5, false, vec![(45, 1, 1, 2, 2, 0), (43, 2, 2, 2, 0, 0), (16, 2, 4, 2, 0, 2)]),
        (4, 90, false, vec![(71, 2, 3, 1, 0, 0)]),
        (5, 7, false, vec![(35, 1, 1, 3, 6, 0), (33, 2, 1, 3, 10, 0)]),
        (6, 2, false, vec![(52, 2, 1, 2, 5, 0), (20, 1, 4, 2, 0, 3), (8, 2, 4, 1, 0, 1)]),
        (7, 1, true, vec![(21, 1, 4, 2, 0, 3)]),
    ];

    let mut households = Vec::new();
    let mut persons = Vec::new();
    for (id, bracket, gq, members) in layout {
        let mut hh = household(id, members.len() as u32, bracket, persons.len());
        hh.group_quarters = gq;
        households.push(hh);
        for m in members {
            persons.push(person(persons.len() as u32 + 1, id, m));
        }
    }
    MicroData::new(households, persons).expect("valid micro data")
}

pub fn attributes() -> Vec<AttributeSpec> {
    vec![
        AttributeSpec {
            name:    "hh_total".into(),
            level:   AttributeLevel::Household(HouseholdField::Size),
            matcher: Matcher::Between { low: 1, high: 100 },
        },
        AttributeSpec {
            name:    "hh_single".into(),
            level:   AttributeLevel::Household(HouseholdField::Size),
            matcher: Matcher::Equals { value: 1 },
        },
        AttributeSpec {
            name:    "persons_female".into(),
            level:   AttributeLevel::Person(PersonField::Gender),
            matcher: Matcher::Equals { value: 2 },
        },
        AttributeSpec {
            name:    "persons_employed".into(),
            level:   AttributeLevel::Person(PersonField::Occupation),
            matcher: Matcher::Equals { value: 1 },
        },
    ]
}

fn targets(pairs: &[(&str, f64)]) -> AttributeTargets {
    pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
}

pub fn marginals() -> Marginals {
    let mut municipality = MarginalTable::default();
    municipality.insert(1, targets(&[("hh_total", 30.0), ("hh_single", 9.0), ("persons_employed", 34.0)]));
    municipality.insert(2, targets(&[("hh_total", 15.0), ("hh_single", 5.0), ("persons_employed", 16.0)]));
    let mut region = MarginalTable::default();
    region.insert(100, targets(&[("persons_female", 48.0)]));
    Marginals { municipality, region }
}

pub fn geography() -> Geography {
    Geography::new(vec![
        Municipality { id: 1, region: Some(100), zones: vec![11, 12] },
        Municipality { id: 2, region: Some(100), zones: vec![21] },
    ])
}

pub fn distances() -> DistanceMatrix {
    DistanceMatrix::from_rows(
        vec![11, 12, 21],
        vec![
            vec![1.0, 3.0, 8.0],
            vec![3.0, 1.0, 6.0],
            vec![8.0, 6.0, 2.0],
        ],
    )
    .expect("square matrix")
}

pub fn jobs() -> Vec<Job> {
    let mut jobs = Vec::new();
    let mut next = 1000;
    for (zone, job_type, n) in [
        (11, JobType::Serv, 8),
        (12, JobType::Serv, 6),
        (21, JobType::Serv, 6),
        (11, JobType::Retl, 4),
        (21, JobType::Retl, 6),
    ] {
        for _ in 0..n {
            jobs.push(Job { id: next, zone, job_type, worker: None });
            next += 1;
        }
    }
    jobs
}

pub fn schools() -> Vec<School> {
    vec![
        School { id: 500, zone: 12, school_type: SchoolType::Primary, capacity: 6, occupancy: 0 },
        School { id: 501, zone: 21, school_type: SchoolType::Primary, capacity: 4, occupancy: 0 },
        School { id: 510, zone: 21, school_type: SchoolType::Secondary, capacity: 3, occupancy: 0 },
        School { id: 520, zone: 11, school_type: SchoolType::Tertiary, capacity: 40, occupancy: 0 },
    ]
}

pub fn job_type_probabilities() -> JobTypeProbabilities {
    let mut rows = Vec::new();
    for gender in [Gender::Male, Gender::Female] {
        for education in [
            EducationLevel::None,
            EducationLevel::Primary,
            EducationLevel::Secondary,
            EducationLevel::Tertiary,
        ] {
            rows.push(JobTypeRow {
                gender,
                education,
                weights: vec![(JobType::Serv, 0.6), (JobType::Retl, 0.4)],
            });
        }
    }
    JobTypeProbabilities::from_rows(rows)
}

pub fn inputs() -> PipelineInputs {
    let inputs = PipelineInputs {
        microdata:              microdata(),
        attributes:             attributes(),
        marginals:              marginals(),
        geography:              geography(),
        zone_weights:           BTreeMap::from([(11, 60.0), (12, 40.0), (21, 100.0)]),
        household_counts:       BTreeMap::from([(1, 30), (2, 15)]),
        vacant_dwellings:       BTreeMap::from([(1, 3), (2, 2)]),
        distances:              distances(),
        jobs:                   jobs(),
        schools:                schools(),
        dictionaries:           Dictionaries::default_test(),
        job_type_probabilities: job_type_probabilities(),
    };
    inputs.validate().expect("fixture inputs are consistent");
    inputs
}
