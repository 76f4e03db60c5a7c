//! Read-only lookup tables supplied by the surrounding model.
//!
//! A code missing from a dictionary is a broken input contract, not data
//! sparsity, and surfaces as `SynPopError::MissingCategory`.

use crate::{
    categories::{EducationLevel, Gender, JobType, Occupation, SchoolType},
    error::{SynPopError, SynPopResult},
    rng::StageRng,
};
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDictionary<T> {
    pub name:    String,
    pub entries: HashMap<i32, T>,
}

impl<T: Copy> CategoryDictionary<T> {
    pub fn new(name: &str, entries: impl IntoIterator<Item = (i32, T)>) -> Self {
        Self { name: name.to_string(), entries: entries.into_iter().collect() }
    }

    pub fn translate(&self, code: i32) -> SynPopResult<T> {
        self.entries.get(&code).copied().ok_or_else(|| SynPopError::MissingCategory {
            dictionary: self.name.clone(),
            code: code.to_string(),
        })
    }
}

/// Census code translations used when materializing persons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dictionaries {
    pub gender:      CategoryDictionary<Gender>,
    pub occupation:  CategoryDictionary<Occupation>,
    pub job_sector:  CategoryDictionary<JobType>,
    pub education:   CategoryDictionary<EducationLevel>,
    pub school_type: CategoryDictionary<SchoolType>,
}

impl Dictionaries {
    /// Codes used by the test fixtures.
    pub fn default_test() -> Self {
        Self {
            gender: CategoryDictionary::new("gender", [(1, Gender::Male), (2, Gender::Female)]),
            occupation: CategoryDictionary::new(
                "occupation",
                [
                    (0, Occupation::Toddler),
                    (1, Occupation::Employed),
                    (2, Occupation::Unemployed),
                    (3, Occupation::Retiree),
                    (4, Occupation::Student),
                ],
            ),
            job_sector: CategoryDictionary::new(
                "job_sector",
                JobType::ALL.iter().enumerate().map(|(i, &t)| (i as i32 + 1, t)),
            ),
            education: CategoryDictionary::new(
                "education",
                [
                    (0, EducationLevel::None),
                    (1, EducationLevel::Primary),
                    (2, EducationLevel::Secondary),
                    (3, EducationLevel::Tertiary),
                ],
            ),
            school_type: CategoryDictionary::new(
                "school_type",
                [
                    (1, SchoolType::Primary),
                    (2, SchoolType::Secondary),
                    (3, SchoolType::Tertiary),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTypeRow {
    pub gender:    Gender,
    pub education: EducationLevel,
    pub weights:   Vec<(JobType, f64)>,
}

/// P(job type | gender, education).
#[derive(Debug, Clone, Default)]
pub struct JobTypeProbabilities {
    rows: HashMap<(Gender, EducationLevel), Vec<(JobType, f64)>>,
}

impl JobTypeProbabilities {
    pub fn from_rows(rows: Vec<JobTypeRow>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|r| ((r.gender, r.education), r.weights))
                .collect(),
        }
    }

    /// Every (gender, education) pair demands only `job_type`.
    pub fn uniform(job_type: JobType) -> Self {
        let mut rows = HashMap::new();
        for g in [Gender::Male, Gender::Female] {
            for e in [
                EducationLevel::None,
                EducationLevel::Primary,
                EducationLevel::Secondary,
                EducationLevel::Tertiary,
            ] {
                rows.insert((g, e), vec![(job_type, 1.0)]);
            }
        }
        Self { rows }
    }

    pub fn sample(
        &self,
        gender: Gender,
        education: EducationLevel,
        rng: &mut StageRng,
    ) -> SynPopResult<JobType> {
        let weights = self.rows.get(&(gender, education)).ok_or_else(|| {
            SynPopError::MissingCategory {
                dictionary: "job_type_probabilities".into(),
                code: format!("{gender:?}/{education:?}"),
            }
        })?;
        if weights.iter().any(|(_, w)| !w.is_finite()) {
            return Err(SynPopError::InvalidDistribution(format!(
                "job type probabilities for {gender:?}/{education:?} are not finite"
            )));
        }
        let dist = WeightedIndex::new(weights.iter().map(|(_, w)| w.max(0.0))).map_err(|e| {
            SynPopError::InvalidDistribution(format!(
                "job type probabilities for {gender:?}/{education:?}: {e}"
            ))
        })?;
        Ok(weights[dist.sample(rng)].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(weights: Vec<(JobType, f64)>) -> JobTypeProbabilities {
        JobTypeProbabilities::from_rows(vec![JobTypeRow {
            gender: Gender::Female,
            education: EducationLevel::Tertiary,
            weights,
        }])
    }

    #[test]
    fn zero_weight_job_types_are_never_drawn() {
        let probs = table(vec![(JobType::Agri, 0.0), (JobType::Finc, 3.0), (JobType::Serv, 1.0)]);
        let mut rng = StageRng::new(17, 0);
        let mut finc = 0;
        for _ in 0..400 {
            let t = probs.sample(Gender::Female, EducationLevel::Tertiary, &mut rng).unwrap();
            assert_ne!(t, JobType::Agri, "zero-weight type drawn");
            if t == JobType::Finc {
                finc += 1;
            }
        }
        assert!((250..=350).contains(&finc), "Finc drawn {finc} of 400 times");
    }

    #[test]
    fn all_zero_or_missing_rows_are_errors() {
        let probs = table(vec![(JobType::Agri, 0.0), (JobType::Serv, 0.0)]);
        let mut rng = StageRng::new(1, 0);
        assert!(matches!(
            probs.sample(Gender::Female, EducationLevel::Tertiary, &mut rng),
            Err(SynPopError::InvalidDistribution(_))
        ));
        assert!(matches!(
            probs.sample(Gender::Male, EducationLevel::None, &mut rng),
            Err(SynPopError::MissingCategory { .. })
        ));
        let infinite = table(vec![(JobType::Serv, f64::INFINITY)]);
        assert!(matches!(
            infinite.sample(Gender::Female, EducationLevel::Tertiary, &mut rng),
            Err(SynPopError::InvalidDistribution(_))
        ));
    }
}
