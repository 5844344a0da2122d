use serde::{Deserialize, Serialize};

use crate::regression::design::Term;
use crate::regression::ols::OlsFit;
use crate::types::CohortGroup;

/// A point estimate with its standard error, on the log scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub point: f64,
    pub std_error: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            lower: f(self.lower),
            upper: f(self.upper),
        }
    }
}

/// Log-scale estimate plus its multiplicative and percentage readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub estimate: f64,
    pub std_error: f64,
    pub ci: ConfidenceInterval,
    pub multiplier: f64,
    pub multiplier_ci: ConfidenceInterval,
    pub percent: f64,
    pub percent_ci: ConfidenceInterval,
}

fn percent(log_effect: f64) -> f64 {
    (log_effect.exp() - 1.0) * 100.0
}

impl Estimate {
    /// Symmetric interval `point ± z * std_error`
    pub fn ci(&self, z: f64) -> ConfidenceInterval {
        let half = z * self.std_error;
        ConfidenceInterval {
            lower: self.point - half,
            upper: self.point + half,
        }
    }

    pub fn effect(&self, z: f64) -> Effect {
        let ci = self.ci(z);
        Effect {
            estimate: self.point,
            std_error: self.std_error,
            ci,
            multiplier: self.point.exp(),
            multiplier_ci: ci.map(f64::exp),
            percent: percent(self.point),
            percent_ci: ci.map(percent),
        }
    }
}

/// Coefficient, variance and covariance slots for one group.
///
/// The reference group has no column; it reads as a zero coefficient with no
/// variance. Groups absent from the fit return `None`.
fn group_slot(fit: &OlsFit, group: CohortGroup, reference: CohortGroup) -> Option<Option<Term>> {
    if group == reference {
        return Some(None);
    }
    let term = Term::Group(group);
    fit.design.column(&term)?;
    Some(Some(term))
}

/// Estimate of a group's coefficient relative to the reference
pub fn group_estimate(fit: &OlsFit, group: CohortGroup, reference: CohortGroup) -> Option<Estimate> {
    match group_slot(fit, group, reference)? {
        None => Some(Estimate {
            point: 0.0,
            std_error: 0.0,
        }),
        Some(term) => Some(Estimate {
            point: fit.coefficient(&term)?,
            std_error: fit.variance(&term)?.max(0.0).sqrt(),
        }),
    }
}

/// Difference `a - b` of two group coefficients.
///
/// The standard error is `sqrt(var(a) + var(b) + 2 cov(a, b))`.
pub fn contrast(fit: &OlsFit, a: CohortGroup, b: CohortGroup, reference: CohortGroup) -> Option<Estimate> {
    let slot_a = group_slot(fit, a, reference)?;
    let slot_b = group_slot(fit, b, reference)?;

    let coef = |slot: &Option<Term>| slot.as_ref().and_then(|t| fit.coefficient(t)).unwrap_or(0.0);
    let var = |slot: &Option<Term>| slot.as_ref().and_then(|t| fit.variance(t)).unwrap_or(0.0);
    let cov = match (&slot_a, &slot_b) {
        (Some(ta), Some(tb)) => fit.covariance_between(ta, tb).unwrap_or(0.0),
        _ => 0.0,
    };

    let variance = var(&slot_a) + var(&slot_b) + 2.0 * cov;
    Some(Estimate {
        point: coef(&slot_a) - coef(&slot_b),
        std_error: variance.max(0.0).sqrt(),
    })
}
