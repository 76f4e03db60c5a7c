//! In-memory micro-data tables.
//!
//! Records are loaded once from already-parsed census extracts and never
//! mutated. Persons of a household are stored contiguously; the household
//! record points at its first person and carries the household size.

use crate::{
    error::{SynPopError, SynPopResult},
    types::RecordIndex,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroHouseholdRecord {
    pub id:             u32,
    pub size:           u32,
    /// Group-quarters records never seed a private household.
    #[serde(default)]
    pub group_quarters: bool,
    pub income_bracket: i32,
    pub dwelling_type:  i32,
    pub dwelling_usage: i32,
    pub dwelling_year:  i32,
    pub floor_space:    i32,
    /// Index into `MicroData::persons` of this household's first person.
    pub first_person:   RecordIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroPersonRecord {
    pub id:           u32,
    pub household_id: u32,
    pub age:          u32,
    pub gender:       i32,
    pub occupation:   i32,
    pub nationality:  i32,
    pub job_sector:   i32,
    pub education:    i32,
    /// Zero when the person attends no school.
    pub school_type:  i32,
}

/// Household-level columns a calibration attribute can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdField {
    Size,
    IncomeBracket,
    DwellingType,
    DwellingUsage,
    DwellingYear,
    FloorSpace,
}

/// Person-level columns a calibration attribute can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonField {
    Age,
    Gender,
    Occupation,
    Nationality,
    JobSector,
    Education,
    SchoolType,
}

impl MicroHouseholdRecord {
    pub fn field(&self, field: HouseholdField) -> i64 {
        match field {
            HouseholdField::Size => self.size as i64,
            HouseholdField::IncomeBracket => self.income_bracket as i64,
            HouseholdField::DwellingType => self.dwelling_type as i64,
            HouseholdField::DwellingUsage => self.dwelling_usage as i64,
            HouseholdField::DwellingYear => self.dwelling_year as i64,
            HouseholdField::FloorSpace => self.floor_space as i64,
        }
    }
}

impl MicroPersonRecord {
    pub fn field(&self, field: PersonField) -> i64 {
        match field {
            PersonField::Age => self.age as i64,
            PersonField::Gender => self.gender as i64,
            PersonField::Occupation => self.occupation as i64,
            PersonField::Nationality => self.nationality as i64,
            PersonField::JobSector => self.job_sector as i64,
            PersonField::Education => self.education as i64,
            PersonField::SchoolType => self.school_type as i64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MicroData {
    pub households: Vec<MicroHouseholdRecord>,
    pub persons:    Vec<MicroPersonRecord>,
}

impl MicroData {
    pub fn new(
        households: Vec<MicroHouseholdRecord>,
        persons: Vec<MicroPersonRecord>,
    ) -> SynPopResult<Self> {
        let data = Self { households, persons };
        data.validate()?;
        Ok(data)
    }

    /// Check that every household's person range exists and points back at it.
    pub fn validate(&self) -> SynPopResult<()> {
        for hh in &self.households {
            let end = hh.first_person + hh.size as usize;
            if end > self.persons.len() {
                return Err(SynPopError::ShapeMismatch {
                    context: format!("persons of micro household {}", hh.id),
                    expected: end,
                    actual: self.persons.len(),
                });
            }
            if let Some(p) = self.persons[hh.first_person..end]
                .iter()
                .find(|p| p.household_id != hh.id)
            {
                return Err(anyhow::anyhow!(
                    "micro person {} belongs to household {}, listed under household {}",
                    p.id,
                    p.household_id,
                    hh.id
                )
                .into());
            }
        }
        Ok(())
    }

    pub fn household_count(&self) -> usize {
        self.households.len()
    }

    pub fn household(&self, index: RecordIndex) -> &MicroHouseholdRecord {
        &self.households[index]
    }

    pub fn persons_of(&self, index: RecordIndex) -> &[MicroPersonRecord] {
        let hh = &self.households[index];
        &self.persons[hh.first_person..hh.first_person + hh.size as usize]
    }
}
