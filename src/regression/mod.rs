// Log-linear fixed-effects regression and contrast extraction

pub mod contrast;
pub mod design;
pub mod ols;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::{FixedEffect, ModelSpec};
use crate::constants::Z_95;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::{CohortGroup, Grouping, MatchedSale};

pub use contrast::{contrast, group_estimate, ConfidenceInterval, Effect, Estimate};
pub use design::{Design, Term};
pub use ols::OlsFit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEffect {
    pub group: CohortGroup,
    pub observations: usize,
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastEffect {
    pub minuend: CohortGroup,
    pub subtrahend: CohortGroup,
    pub effect: Effect,
}

/// Everything reported for one fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEstimates {
    pub model: String,
    pub grouping: Grouping,
    pub reference: CohortGroup,
    pub fixed_effects: Vec<FixedEffect>,
    pub observations: usize,
    pub parameters: usize,
    pub dropped_rows: usize,
    pub r_squared: f64,
    pub sigma: f64,
    pub group_effects: Vec<GroupEffect>,
    pub contrasts: Vec<ContrastEffect>,
    /// Contrasts naming a group with no observations in this model
    pub skipped_contrasts: Vec<String>,
}

impl ModelEstimates {
    pub fn group(&self, group: CohortGroup) -> Option<&GroupEffect> {
        self.group_effects.iter().find(|g| g.group == group)
    }

    pub fn contrast(&self, minuend: CohortGroup, subtrahend: CohortGroup) -> Option<&ContrastEffect> {
        self.contrasts
            .iter()
            .find(|c| c.minuend == minuend && c.subtrahend == subtrahend)
    }
}

/// Fit `spec` over its filtered table and extract group effects and contrasts
#[instrument(skip_all, fields(model = %spec.name))]
pub fn fit_model(spec: &ModelSpec, rows: &[MatchedSale]) -> Result<ModelEstimates> {
    let started = Instant::now();
    let fit = Design::build(spec, rows).and_then(|design| ols::fit(&spec.name, design));
    let fit = match fit {
        Ok(fit) => fit,
        Err(e) => {
            metrics::model::fit_error(&spec.name);
            return Err(e);
        }
    };
    metrics::model::fit_completed(&spec.name, fit.observations(), started.elapsed().as_secs_f64());

    let group_effects = spec
        .grouping
        .levels()
        .iter()
        .filter(|g| **g != spec.reference)
        .filter_map(|g| {
            let estimate = group_estimate(&fit, *g, spec.reference)?;
            Some(GroupEffect {
                group: *g,
                observations: fit.design.group_observations(*g),
                effect: estimate.effect(Z_95),
            })
        })
        .collect();

    let mut contrasts = Vec::new();
    let mut skipped_contrasts = Vec::new();
    for c in &spec.contrasts {
        match contrast(&fit, c.minuend, c.subtrahend, spec.reference) {
            Some(estimate) => contrasts.push(ContrastEffect {
                minuend: c.minuend,
                subtrahend: c.subtrahend,
                effect: estimate.effect(Z_95),
            }),
            None => {
                warn!(
                    "Model '{}': skipping contrast {} - {} (group not observed)",
                    spec.name, c.minuend, c.subtrahend
                );
                skipped_contrasts.push(format!("{} - {}", c.minuend, c.subtrahend));
            }
        }
    }

    info!(
        "📈 Model '{}' fit on {} rows with {} parameters (R² = {:.4})",
        spec.name,
        fit.observations(),
        fit.parameters(),
        fit.r_squared
    );

    Ok(ModelEstimates {
        model: spec.name.clone(),
        grouping: spec.grouping,
        reference: spec.reference,
        fixed_effects: spec.fixed_effects.clone(),
        observations: fit.observations(),
        parameters: fit.parameters(),
        dropped_rows: fit.design.dropped_rows,
        r_squared: fit.r_squared,
        sigma: fit.sigma,
        group_effects,
        contrasts,
        skipped_contrasts,
    })
}
