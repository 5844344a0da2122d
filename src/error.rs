use std::path::PathBuf;
use thiserror::Error;

use crate::types::CohortGroup;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {table} table '{}': {source}", path.display())]
    ReadInput {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input table '{table}' is missing required column '{column}'")]
    MissingColumn { table: &'static str, column: &'static str },

    #[error("Unparseable coordinate for parcel {apn}: {value:?}")]
    InvalidCoordinate { apn: String, value: String },

    #[error("Unparseable sale date for parcel {apn}: {value:?}")]
    InvalidDate { apn: String, value: String },

    #[error("No subsidized housing units survived normalization; nothing to match against")]
    NoHousingUnits,

    #[error("Model '{model}': reference group '{group}' has no observations")]
    MissingReferenceLevel { model: String, group: CohortGroup },

    #[error("Model '{model}': design matrix is singular ({detail})")]
    SingularDesign { model: String, detail: String },

    #[error("Model '{model}': {observations} observations cannot identify {parameters} parameters")]
    InsufficientObservations {
        model: String,
        observations: usize,
        parameters: usize,
    },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
