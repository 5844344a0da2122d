// Pipeline ingestion: raw CSV tables and their content fingerprints

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::config::InputConfig;
use crate::constants::{BARNES_YEAR_COLUMN, LIHTC_ID_COLUMN, LIHTC_YEAR_COLUMN};
use crate::error::{AnalysisError, Result};
use crate::observability::metrics;

pub const PROPERTY_TABLE: &str = "property_details";
pub const LIHTC_TABLE: &str = "lihtc";
pub const SALES_TABLE: &str = "sales";
pub const BARNES_TABLE: &str = "barnes";

/// One row of the property details table
#[derive(Debug, Clone, Deserialize)]
pub struct RawPropertyRow {
    pub apn: String,
    pub centroid: Option<String>,
    pub tract: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub square_footage: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub year_built: Option<f64>,
}

/// One row of the LIHTC (HUD) housing table
#[derive(Debug, Clone, Deserialize)]
pub struct RawLihtcRow {
    #[serde(rename = "HUD_ID")]
    pub hud_id: Option<String>,
    #[serde(rename = "YR_PIS", deserialize_with = "csv::invalid_option")]
    pub year_placed_in_service: Option<f64>,
    #[serde(rename = "LATITUDE", deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "LONGITUDE", deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
}

/// One row of the sales table
#[derive(Debug, Clone, Deserialize)]
pub struct RawSaleRow {
    pub apn: String,
    pub ownerdate: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub amount: Option<f64>,
}

/// One row of the Barnes housing table
#[derive(Debug, Clone, Deserialize)]
pub struct RawBarnesRow {
    #[serde(rename = "Barnes.Year", deserialize_with = "csv::invalid_option")]
    pub year: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub lng: Option<f64>,
}

/// Content fingerprint of an input file, recorded in the run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFingerprint {
    pub table: String,
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// A deserialized table plus the number of rows the reader rejected
#[derive(Debug, Clone)]
pub struct LoadedTable<T> {
    pub rows: Vec<T>,
    pub rejected: usize,
    pub fingerprint: InputFingerprint,
}

/// All four input tables
#[derive(Debug, Clone)]
pub struct InputTables {
    pub properties: LoadedTable<RawPropertyRow>,
    pub lihtc: LoadedTable<RawLihtcRow>,
    pub sales: LoadedTable<RawSaleRow>,
    pub barnes: LoadedTable<RawBarnesRow>,
}

impl InputTables {
    pub fn fingerprints(&self) -> Vec<InputFingerprint> {
        vec![
            self.properties.fingerprint.clone(),
            self.lihtc.fingerprint.clone(),
            self.sales.fingerprint.clone(),
            self.barnes.fingerprint.clone(),
        ]
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Parse CSV bytes into `T`, failing only when a required column is absent.
///
/// Rows that do not deserialize are counted and skipped.
pub fn parse_table<T: DeserializeOwned>(
    bytes: &[u8],
    table: &'static str,
    required: &[&'static str],
) -> Result<(Vec<T>, usize)> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(AnalysisError::MissingColumn { table, column });
        }
    }

    let mut rows = Vec::new();
    let mut rejected = 0;
    for (i, result) in rdr.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                debug!(table, row = i, "Skipping undeserializable row: {}", e);
                rejected += 1;
            }
        }
    }
    Ok((rows, rejected))
}

#[instrument(skip(required), fields(path = %path.display()))]
pub fn load_table<T: DeserializeOwned>(
    path: &Path,
    table: &'static str,
    required: &[&'static str],
) -> Result<LoadedTable<T>> {
    let bytes = fs::read(path).map_err(|source| AnalysisError::ReadInput {
        table,
        path: path.to_path_buf(),
        source,
    })?;
    let fingerprint = InputFingerprint {
        table: table.to_string(),
        path: path.to_path_buf(),
        sha256: sha256_hex(&bytes),
        bytes: bytes.len() as u64,
    };

    let (rows, rejected) = parse_table::<T>(&bytes, table, required)?;
    info!("📥 Loaded {} rows from {} ({} rejected)", rows.len(), table, rejected);
    metrics::ingest::rows_loaded(table, rows.len());
    metrics::ingest::rows_rejected(table, rejected);

    Ok(LoadedTable {
        rows,
        rejected,
        fingerprint,
    })
}

pub fn load_inputs(inputs: &InputConfig) -> Result<InputTables> {
    Ok(InputTables {
        properties: load_table(
            &inputs.property_details,
            PROPERTY_TABLE,
            &["apn", "centroid", "tract", "square_footage", "year_built"],
        )?,
        lihtc: load_table(
            &inputs.lihtc,
            LIHTC_TABLE,
            &[LIHTC_YEAR_COLUMN, "LATITUDE", "LONGITUDE", LIHTC_ID_COLUMN],
        )?,
        sales: load_table(&inputs.sales, SALES_TABLE, &["apn", "ownerdate", "amount"])?,
        barnes: load_table(&inputs.barnes, BARNES_TABLE, &[BARNES_YEAR_COLUMN, "lat", "lng"])?,
    })
}
