//! Synthetic agents produced by population synthesis.

use crate::{
    categories::{EducationLevel, Gender, JobType, Occupation, SchoolType},
    types::{DwellingId, GeoId, HouseholdId, PersonId, ZoneId},
};
use serde::{Deserialize, Serialize};

/// Where a worker or student ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    /// Bound to a vacant entity (job or school) in `zone`.
    Assigned { zone: ZoneId, entity: u64 },
    /// No vacancy left for the required type inside the study area.
    Outside,
}

impl Binding {
    pub fn is_outside(&self) -> bool {
        matches!(self, Binding::Outside)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticHousehold {
    pub id:              HouseholdId,
    pub geography:       GeoId,
    pub zone:            ZoneId,
    pub dwelling_id:     DwellingId,
    /// Micro household record this agent was drawn from.
    pub micro_record_id: u32,
    pub size:            u32,
    pub income_bracket:  i32,
    pub income:          f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticPerson {
    pub id:              PersonId,
    pub household_id:    HouseholdId,
    pub zone:            ZoneId,
    pub micro_record_id: u32,
    pub age:             u32,
    pub gender:          Gender,
    pub occupation:      Occupation,
    pub nationality:     i32,
    pub job_sector:      Option<JobType>,
    pub education:       EducationLevel,
    pub school_type:     Option<SchoolType>,
    pub workplace:       Option<Binding>,
    pub school:          Option<Binding>,
}

impl SyntheticPerson {
    pub fn is_employed(&self) -> bool {
        self.occupation == Occupation::Employed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDwelling {
    pub id:            DwellingId,
    pub geography:     GeoId,
    pub zone:          ZoneId,
    /// `None` for vacant dwellings.
    pub household_id:  Option<HouseholdId>,
    pub dwelling_type: i32,
    pub usage:         i32,
    pub year_bracket:  i32,
    pub floor_space:   i32,
}

impl SyntheticDwelling {
    pub fn is_vacant(&self) -> bool {
        self.household_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntheticPopulation {
    pub households: Vec<SyntheticHousehold>,
    pub persons:    Vec<SyntheticPerson>,
    pub dwellings:  Vec<SyntheticDwelling>,
}

impl SyntheticPopulation {
    pub fn extend(&mut self, other: SyntheticPopulation) {
        self.households.extend(other.households);
        self.persons.extend(other.persons);
        self.dwellings.extend(other.dwellings);
    }

    pub fn vacant_dwelling_count(&self) -> usize {
        self.dwellings.iter().filter(|d| d.is_vacant()).count()
    }
}
