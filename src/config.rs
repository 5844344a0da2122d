use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{AnalysisError, Result};
use crate::types::{CohortGroup, Grouping};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub inputs: InputConfig,
    pub filters: FilterConfig,
    pub output: OutputConfig,
    pub models: Vec<ModelSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub property_details: PathBuf,
    pub lihtc: PathBuf,
    pub sales: PathBuf,
    pub barnes: PathBuf,
}

/// Thresholds for the filter stage and the housing year sanity check
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub max_distance_miles: f64,
    pub max_year_gap: i32,
    pub max_sale_amount: f64,
    pub housing_year_min: i32,
    pub housing_year_max: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub report_dir: PathBuf,
    pub log_dir: PathBuf,
    pub write_metrics: bool,
}

/// Categorical covariates absorbed as fixed effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedEffect {
    SaleYear,
    Tract,
}

/// A difference `minuend - subtrahend` between two group coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContrastSpec {
    pub minuend: CohortGroup,
    pub subtrahend: CohortGroup,
}

impl ContrastSpec {
    pub fn new(minuend: CohortGroup, subtrahend: CohortGroup) -> Self {
        Self { minuend, subtrahend }
    }
}

/// One regression specification, fit over its own derived table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelSpec {
    pub name: String,
    pub grouping: Grouping,
    pub reference: CohortGroup,
    #[serde(default = "default_fixed_effects")]
    pub fixed_effects: Vec<FixedEffect>,
    #[serde(default)]
    pub contrasts: Vec<ContrastSpec>,
}

fn default_fixed_effects() -> Vec<FixedEffect> {
    vec![FixedEffect::SaleYear, FixedEffect::Tract]
}

impl ModelSpec {
    /// Inside-only grouping measured against the outer ring
    pub fn inside_default() -> Self {
        Self {
            name: "inside".to_string(),
            grouping: Grouping::InsideOnly,
            reference: CohortGroup::Outside,
            fixed_effects: default_fixed_effects(),
            contrasts: vec![ContrastSpec::new(CohortGroup::Post, CohortGroup::Pre)],
        }
    }

    /// Full grouping measured against outer-ring sales made before development
    pub fn full_default() -> Self {
        Self {
            name: "full".to_string(),
            grouping: Grouping::Full,
            reference: CohortGroup::OutsidePre,
            fixed_effects: default_fixed_effects(),
            contrasts: vec![
                ContrastSpec::new(CohortGroup::Post, CohortGroup::Pre),
                ContrastSpec::new(CohortGroup::OutsidePost, CohortGroup::OutsideMid),
                ContrastSpec::new(CohortGroup::Post, CohortGroup::OutsidePost),
            ],
        }
    }

    pub fn uses(&self, effect: FixedEffect) -> bool {
        self.fixed_effects.contains(&effect)
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            property_details: PathBuf::from("data/property_details.csv"),
            lihtc: PathBuf::from("data/lihtc.csv"),
            sales: PathBuf::from("data/sales.csv"),
            barnes: PathBuf::from("data/barnes.csv"),
        }
    }
}

impl InputConfig {
    /// The four standard file names inside a single directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            property_details: dir.join("property_details.csv"),
            lihtc: dir.join("lihtc.csv"),
            sales: dir.join("sales.csv"),
            barnes: dir.join("barnes.csv"),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_distance_miles: constants::OUTER_RADIUS_MILES,
            max_year_gap: constants::MAX_YEAR_GAP,
            max_sale_amount: constants::MAX_SALE_AMOUNT,
            housing_year_min: constants::HOUSING_YEAR_MIN,
            housing_year_max: constants::HOUSING_YEAR_MAX,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            write_metrics: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: InputConfig::default(),
            filters: FilterConfig::default(),
            output: OutputConfig::default(),
            models: vec![ModelSpec::inside_default(), ModelSpec::full_default()],
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            AnalysisError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let f = &self.filters;
        if !(f.max_distance_miles > 0.0) {
            return Err(AnalysisError::Config(
                "filters.max_distance_miles must be positive".to_string(),
            ));
        }
        if f.max_year_gap < 0 {
            return Err(AnalysisError::Config(
                "filters.max_year_gap must not be negative".to_string(),
            ));
        }
        if !(f.max_sale_amount > 0.0) {
            return Err(AnalysisError::Config(
                "filters.max_sale_amount must be positive".to_string(),
            ));
        }
        if f.housing_year_min >= f.housing_year_max {
            return Err(AnalysisError::Config(format!(
                "empty housing year range [{}, {})",
                f.housing_year_min, f.housing_year_max
            )));
        }

        if self.models.is_empty() {
            return Err(AnalysisError::Config("at least one [[models]] entry is required".to_string()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(AnalysisError::Config(format!("duplicate model name '{}'", model.name)));
            }
            let levels = model.grouping.levels();
            if !levels.contains(&model.reference) {
                return Err(AnalysisError::Config(format!(
                    "model '{}': reference '{}' is not a level of the {} grouping",
                    model.name, model.reference, model.grouping
                )));
            }
            for contrast in &model.contrasts {
                for group in [contrast.minuend, contrast.subtrahend] {
                    if !levels.contains(&group) {
                        return Err(AnalysisError::Config(format!(
                            "model '{}': contrast group '{}' is not a level of the {} grouping",
                            model.name, group, model.grouping
                        )));
                    }
                }
                if contrast.minuend == contrast.subtrahend {
                    return Err(AnalysisError::Config(format!(
                        "model '{}': contrast compares '{}' with itself",
                        model.name, contrast.minuend
                    )));
                }
            }
        }

        Ok(())
    }
}
