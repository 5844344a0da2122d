use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::ingestion::InputFingerprint;
use crate::pipeline::processing::normalize::NormalizationSummary;
use crate::pipeline::processing::StageCount;
use crate::regression::{Effect, ModelEstimates};

/// Rows read from one input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub rows: usize,
    pub rejected: usize,
}

/// Filter trail and estimates for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub filter_stages: Vec<StageCount>,
    pub estimates: ModelEstimates,
}

/// Result of a complete analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub inputs: Vec<InputFingerprint>,
    pub tables: Vec<TableCount>,
    pub normalization: NormalizationSummary,
    pub joined_sales: usize,
    pub unmatched_sales: usize,
    pub matched_sales: usize,
    pub models: Vec<ModelReport>,
}

impl AnalysisReport {
    pub fn model(&self, name: &str) -> Option<&ModelReport> {
        self.models.iter().find(|m| m.estimates.model == name)
    }

    /// Persist the report as pretty JSON under `output_dir`
    pub fn persist_to_json(&self, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;

        let timestamp = self.generated_at.format("%Y%m%d_%H%M%S");
        let filepath = output_dir.join(format!("analysis_{timestamp}.json"));

        let json_content = serde_json::to_string_pretty(self)?;
        fs::write(&filepath, json_content)?;

        Ok(filepath)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn print_summary(&self) {
        println!("\n📊 Analysis {} ({})", self.run_id, self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        for table in &self.tables {
            println!("   {}: {} rows ({} rejected)", table.table, table.rows, table.rejected);
        }
        println!("   Housing units: {}", self.normalization.housing_units);
        println!(
            "   Sales joined to parcels: {} ({} unmatched)",
            self.joined_sales, self.unmatched_sales
        );
        println!("   Sales matched to housing: {}", self.matched_sales);

        for model in &self.models {
            let est = &model.estimates;
            println!(
                "\n📈 Model '{}' ({} grouping, reference {})",
                est.model, est.grouping, est.reference
            );
            for stage in &model.filter_stages {
                println!(
                    "   {:<24} {:>8} -> {:>8}",
                    stage.stage.as_str(),
                    stage.before,
                    stage.after
                );
            }
            println!(
                "   n = {}, p = {}, R² = {:.4}, σ = {:.4}",
                est.observations, est.parameters, est.r_squared, est.sigma
            );
            for g in &est.group_effects {
                println!("   {:<24} {}", format!("{} (n={})", g.group, g.observations), format_effect(&g.effect));
            }
            for c in &est.contrasts {
                println!(
                    "   {:<24} {}",
                    format!("{} - {}", c.minuend, c.subtrahend),
                    format_effect(&c.effect)
                );
            }
            if !est.skipped_contrasts.is_empty() {
                println!("\n⚠️  Skipped contrasts:");
                for skipped in &est.skipped_contrasts {
                    println!("   - {}", skipped);
                }
            }
        }
    }
}

fn format_effect(e: &Effect) -> String {
    format!(
        "{:+.4} (SE {:.4}, 95% CI [{:+.4}, {:+.4}]) -> {:+.2}% [{:+.2}%, {:+.2}%]",
        e.estimate, e.std_error, e.ci.lower, e.ci.upper, e.percent, e.percent_ci.lower, e.percent_ci.upper
    )
}
