use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynPopError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A raw census code has no entry in a translation dictionary.
    #[error("Code {code} missing from dictionary '{dictionary}'")]
    MissingCategory { dictionary: String, code: String },

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Geography {geo} not found")]
    UnknownGeography { geo: u32 },

    #[error("Zone {zone} not found in {context}")]
    UnknownZone { zone: u32, context: String },

    #[error("Attribute '{name}' not found")]
    UnknownAttribute { name: String },

    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SynPopResult<T> = Result<T, SynPopError>;
