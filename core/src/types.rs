//! Shared primitive types used across the entire pipeline.

/// Traffic analysis zone identifier.
pub type ZoneId = u32;

/// Municipality (or any calibration geography) identifier.
pub type GeoId = u32;

/// Region identifier. A region aggregates several municipalities.
pub type RegionId = u32;

/// Row index into a micro-data table or frequency matrix.
pub type RecordIndex = usize;

/// Identifiers handed out by the surrounding platform's id allocators.
pub type HouseholdId = u64;
pub type PersonId = u64;
pub type DwellingId = u64;
pub type JobId = u64;
pub type SchoolId = u64;

/// The canonical run identifier.
pub type RunId = String;
