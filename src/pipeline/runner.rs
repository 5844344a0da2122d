use chrono::Utc;
use std::time::Instant;
use tracing::{info, info_span, instrument};
use uuid::Uuid;

use crate::config::{Config, FilterConfig, ModelSpec};
use crate::error::Result;
use crate::pipeline::ingestion::{self, InputTables, LoadedTable};
use crate::pipeline::processing::normalize::{self, NormalizationSummary};
use crate::pipeline::processing::{apply_filters, assign_groups, join_sales_to_properties, match_sales};
use crate::regression;
use crate::report::{AnalysisReport, ModelReport, TableCount};
use crate::types::{HousingUnit, MatchedSale};

/// Sales matched to their nearest housing unit, before any model-specific step
#[derive(Debug, Clone)]
pub struct MatchedData {
    pub housing: Vec<HousingUnit>,
    pub matched: Vec<MatchedSale>,
    pub normalization: NormalizationSummary,
    pub joined_sales: usize,
    pub unmatched_sales: usize,
}

fn table_count<T>(table: &LoadedTable<T>) -> TableCount {
    TableCount {
        table: table.fingerprint.table.clone(),
        rows: table.rows.len(),
        rejected: table.rejected,
    }
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Normalize, join and match the loaded tables
    #[instrument(skip_all)]
    pub fn prepare(tables: &InputTables, filters: &FilterConfig) -> Result<MatchedData> {
        info!("🔧 Normalizing inputs...");
        let housing = normalize::normalize_housing(&tables.lihtc.rows, &tables.barnes.rows, filters);
        let sales = normalize::normalize_sales(&tables.sales.rows)?;
        let properties = normalize::normalize_properties(&tables.properties.rows)?;

        let housing_rows = tables.lihtc.rows.len() + tables.barnes.rows.len();
        let normalization = NormalizationSummary {
            lihtc_rows: tables.lihtc.rows.len(),
            barnes_rows: tables.barnes.rows.len(),
            housing_units: housing.len(),
            housing_dropped: housing_rows - housing.len(),
            sales_rows: tables.sales.rows.len(),
            sales_dropped: tables.sales.rows.len() - sales.len(),
            property_rows: tables.properties.rows.len(),
            properties_dropped: tables.properties.rows.len() - properties.len(),
        };

        let (joined, unmatched_sales) = join_sales_to_properties(&sales, &properties);
        let joined_sales = joined.len();
        let matched = match_sales(joined, &housing)?;

        Ok(MatchedData {
            housing,
            matched,
            normalization,
            joined_sales,
            unmatched_sales,
        })
    }

    /// Classify, filter and fit one model over its own copy of the matched table
    pub fn run_model(spec: &ModelSpec, matched: &[MatchedSale], filters: &FilterConfig) -> Result<ModelReport> {
        let span = info_span!("model", model = %spec.name, grouping = %spec.grouping);
        let _enter = span.enter();

        let grouped = assign_groups(matched, spec.grouping, filters.max_distance_miles);
        let (table, filter_stages) = apply_filters(grouped, filters, &spec.name);
        let estimates = regression::fit_model(spec, &table)?;

        Ok(ModelReport {
            filter_stages,
            estimates,
        })
    }

    /// Run the complete analysis over the configured inputs
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<AnalysisReport> {
        let run_id = Uuid::new_v4();
        info!("🚀 Starting analysis run {}", run_id);
        let started = Instant::now();

        info!("📥 Loading input tables...");
        let tables = ingestion::load_inputs(&self.config.inputs)?;
        let data = Self::prepare(&tables, &self.config.filters)?;

        let mut models = Vec::with_capacity(self.config.models.len());
        for spec in &self.config.models {
            models.push(Self::run_model(spec, &data.matched, &self.config.filters)?);
        }

        info!(
            "✅ Analysis finished in {:.2}s ({} models)",
            started.elapsed().as_secs_f64(),
            models.len()
        );

        Ok(AnalysisReport {
            run_id,
            generated_at: Utc::now(),
            inputs: tables.fingerprints(),
            tables: vec![
                table_count(&tables.properties),
                table_count(&tables.lihtc),
                table_count(&tables.sales),
                table_count(&tables.barnes),
            ],
            normalization: data.normalization,
            joined_sales: data.joined_sales,
            unmatched_sales: data.unmatched_sales,
            matched_sales: data.matched.len(),
            models,
        })
    }
}
