//! Stage metrics for the analysis pipeline
//!
//! Metric names live in a single enum so every stage records under the same
//! Prometheus naming convention. Without an installed recorder the macros are
//! no-ops, which keeps library callers and tests free of setup.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use ::metrics::Unit;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use crate::error::{AnalysisError, Result};

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion
    IngestRowsLoaded,
    IngestRowsRejected,

    // Normalization
    NormalizeHousingUnits,
    NormalizeRowsDropped,

    // Join
    JoinRowsMatched,
    JoinRowsUnmatched,

    // Nearest-neighbor matching
    MatchSalesMatched,
    MatchDistanceMiles,

    // Filtering
    FilterRowsKept,
    FilterRowsDropped,

    // Modeling
    ModelFitDuration,
    ModelObservations,
    ModelFitErrors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricName {
    pub const ALL: [MetricName; 13] = [
        MetricName::IngestRowsLoaded,
        MetricName::IngestRowsRejected,
        MetricName::NormalizeHousingUnits,
        MetricName::NormalizeRowsDropped,
        MetricName::JoinRowsMatched,
        MetricName::JoinRowsUnmatched,
        MetricName::MatchSalesMatched,
        MetricName::MatchDistanceMiles,
        MetricName::FilterRowsKept,
        MetricName::FilterRowsDropped,
        MetricName::ModelFitDuration,
        MetricName::ModelObservations,
        MetricName::ModelFitErrors,
    ];

    /// Get the metric name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestRowsLoaded => "housing_ingest_rows_loaded_total",
            MetricName::IngestRowsRejected => "housing_ingest_rows_rejected_total",

            MetricName::NormalizeHousingUnits => "housing_normalize_housing_units",
            MetricName::NormalizeRowsDropped => "housing_normalize_rows_dropped_total",

            MetricName::JoinRowsMatched => "housing_join_rows_matched_total",
            MetricName::JoinRowsUnmatched => "housing_join_rows_unmatched_total",

            MetricName::MatchSalesMatched => "housing_match_sales_matched_total",
            MetricName::MatchDistanceMiles => "housing_match_distance_miles",

            MetricName::FilterRowsKept => "housing_filter_rows_kept",
            MetricName::FilterRowsDropped => "housing_filter_rows_dropped_total",

            MetricName::ModelFitDuration => "housing_model_fit_duration_seconds",
            MetricName::ModelObservations => "housing_model_observations",
            MetricName::ModelFitErrors => "housing_model_fit_errors_total",
        }
    }

    /// Returns (kind, description, unit)
    pub fn metadata(&self) -> (MetricKind, &'static str, Option<Unit>) {
        use MetricKind::{Counter, Gauge, Histogram};
        match self {
            MetricName::IngestRowsLoaded => (Counter, "Rows deserialized per input table", Some(Unit::Count)),
            MetricName::IngestRowsRejected => (Counter, "Rows the CSV reader could not deserialize", Some(Unit::Count)),
            MetricName::NormalizeHousingUnits => (Gauge, "Housing units after the year-range filter", Some(Unit::Count)),
            MetricName::NormalizeRowsDropped => (Counter, "Rows dropped during normalization", Some(Unit::Count)),
            MetricName::JoinRowsMatched => (Counter, "Sales joined to a parcel", Some(Unit::Count)),
            MetricName::JoinRowsUnmatched => (Counter, "Sales with no parcel match", Some(Unit::Count)),
            MetricName::MatchSalesMatched => (Counter, "Sales matched to a housing unit", Some(Unit::Count)),
            MetricName::MatchDistanceMiles => (Histogram, "Distance to nearest housing unit in miles", None),
            MetricName::FilterRowsKept => (Gauge, "Rows remaining after each filter stage", Some(Unit::Count)),
            MetricName::FilterRowsDropped => (Counter, "Rows removed by each filter stage", Some(Unit::Count)),
            MetricName::ModelFitDuration => (Histogram, "Least-squares fit duration", Some(Unit::Seconds)),
            MetricName::ModelObservations => (Gauge, "Observations in the model frame", Some(Unit::Count)),
            MetricName::ModelFitErrors => (Counter, "Failed model fits", Some(Unit::Count)),
        }
    }
}

/// Register the description and unit of every metric with the installed recorder
pub fn describe() {
    for name in MetricName::ALL {
        let (kind, description, unit) = name.metadata();
        let key = name.as_str();
        match (kind, unit) {
            (MetricKind::Counter, Some(unit)) => ::metrics::describe_counter!(key, unit, description),
            (MetricKind::Counter, None) => ::metrics::describe_counter!(key, description),
            (MetricKind::Gauge, Some(unit)) => ::metrics::describe_gauge!(key, unit, description),
            (MetricKind::Gauge, None) => ::metrics::describe_gauge!(key, description),
            (MetricKind::Histogram, Some(unit)) => ::metrics::describe_histogram!(key, unit, description),
            (MetricKind::Histogram, None) => ::metrics::describe_histogram!(key, description),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
            describe();
            info!("Metrics recorder installed");
        }
        Err(e) => {
            warn!("Metrics recorder install failed (possibly already installed): {}", e);
        }
    }
}

/// Render the current metrics in Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Write the rendered metrics to `path`. Returns false when no recorder is installed.
pub fn write_snapshot(path: &Path) -> Result<bool> {
    let Some(text) = render() else {
        return Ok(false);
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(AnalysisError::Io)?;
    }
    fs::write(path, text)?;
    Ok(true)
}

// ============================================================================
// Ingestion Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    pub fn rows_loaded(table: &'static str, count: usize) {
        ::metrics::counter!(MetricName::IngestRowsLoaded.as_str(), "table" => table).increment(count as u64);
    }

    pub fn rows_rejected(table: &'static str, count: usize) {
        ::metrics::counter!(MetricName::IngestRowsRejected.as_str(), "table" => table).increment(count as u64);
    }
}

// ============================================================================
// Normalization Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn housing_units(count: usize) {
        ::metrics::gauge!(MetricName::NormalizeHousingUnits.as_str()).set(count as f64);
    }

    pub fn rows_dropped(table: &'static str, count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsDropped.as_str(), "table" => table).increment(count as u64);
    }
}

// ============================================================================
// Join Metrics
// ============================================================================

pub mod join {
    use super::MetricName;

    pub fn rows_matched(count: usize) {
        ::metrics::counter!(MetricName::JoinRowsMatched.as_str()).increment(count as u64);
    }

    pub fn rows_unmatched(count: usize) {
        ::metrics::counter!(MetricName::JoinRowsUnmatched.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Matching Metrics
// ============================================================================

pub mod matching {
    use super::MetricName;

    pub fn sale_matched(distance_miles: f64) {
        ::metrics::counter!(MetricName::MatchSalesMatched.as_str()).increment(1);
        ::metrics::histogram!(MetricName::MatchDistanceMiles.as_str()).record(distance_miles);
    }
}

// ============================================================================
// Filter Metrics
// ============================================================================

pub mod filter {
    use super::MetricName;

    pub fn stage_applied(model: &str, stage: &'static str, before: usize, after: usize) {
        ::metrics::gauge!(MetricName::FilterRowsKept.as_str(),
            "model" => model.to_string(),
            "stage" => stage
        )
        .set(after as f64);
        ::metrics::counter!(MetricName::FilterRowsDropped.as_str(),
            "model" => model.to_string(),
            "stage" => stage
        )
        .increment(before.saturating_sub(after) as u64);
    }
}

// ============================================================================
// Model Metrics
// ============================================================================

pub mod model {
    use super::MetricName;

    pub fn fit_completed(model: &str, observations: usize, secs: f64) {
        ::metrics::histogram!(MetricName::ModelFitDuration.as_str(), "model" => model.to_string()).record(secs);
        ::metrics::gauge!(MetricName::ModelObservations.as_str(), "model" => model.to_string())
            .set(observations as f64);
    }

    pub fn fit_error(model: &str) {
        ::metrics::counter!(MetricName::ModelFitErrors.as_str(), "model" => model.to_string()).increment(1);
    }
}
