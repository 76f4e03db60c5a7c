//! Model categories that raw census codes are translated into.
//!
//! These replace the ad hoc integer / string type keys of census extracts
//! with small closed enums. Translation from raw codes happens only through
//! `dictionary::CategoryDictionary`, never by casting.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupation {
    Toddler,
    Employed,
    Unemployed,
    Retiree,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    None,
    Primary,
    Secondary,
    Tertiary,
}

/// Sector of a job, used both for vacancies and for worker demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobType {
    Agri,
    Mnft,
    Util,
    Cons,
    Retl,
    Trns,
    Finc,
    Rlst,
    Admn,
    Serv,
}

impl JobType {
    pub const ALL: [JobType; 10] = [
        JobType::Agri,
        JobType::Mnft,
        JobType::Util,
        JobType::Cons,
        JobType::Retl,
        JobType::Trns,
        JobType::Finc,
        JobType::Rlst,
        JobType::Admn,
        JobType::Serv,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Agri => "Agri",
            Self::Mnft => "Mnft",
            Self::Util => "Util",
            Self::Cons => "Cons",
            Self::Retl => "Retl",
            Self::Trns => "Trns",
            Self::Finc => "Finc",
            Self::Rlst => "Rlst",
            Self::Admn => "Admn",
            Self::Serv => "Serv",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// School tier. Each tier is assigned in its own pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolType {
    Primary,
    Secondary,
    Tertiary,
}

impl SchoolType {
    pub const ALL: [SchoolType; 3] = [SchoolType::Primary, SchoolType::Secondary, SchoolType::Tertiary];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for SchoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
