use nalgebra::{DMatrix, DVector};

use crate::error::{AnalysisError, Result};
use crate::regression::design::{Design, Term};

/// A pivot whose squared size falls below this share of its column's sum of
/// squares marks that column as a linear combination of earlier ones.
const COLLINEARITY_TOLERANCE: f64 = 1e-10;

/// Least-squares fit with the classical homoskedastic covariance
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub design: Design,
    pub coefficients: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub sse: f64,
    pub sigma: f64,
    pub r_squared: f64,
}

impl OlsFit {
    pub fn observations(&self) -> usize {
        self.design.observations()
    }

    pub fn parameters(&self) -> usize {
        self.design.parameters()
    }

    pub fn residual_df(&self) -> usize {
        self.observations() - self.parameters()
    }

    pub fn coefficient(&self, term: &Term) -> Option<f64> {
        self.design.column(term).map(|j| self.coefficients[j])
    }

    pub fn variance(&self, term: &Term) -> Option<f64> {
        self.design.column(term).map(|j| self.covariance[(j, j)])
    }

    pub fn covariance_between(&self, a: &Term, b: &Term) -> Option<f64> {
        let i = self.design.column(a)?;
        let j = self.design.column(b)?;
        Some(self.covariance[(i, j)])
    }
}

/// Solve the normal equations through a Cholesky factorization of XᵀX
pub fn fit(model: &str, design: Design) -> Result<OlsFit> {
    let n = design.observations();
    let p = design.parameters();
    if n <= p {
        return Err(AnalysisError::InsufficientObservations {
            model: model.to_string(),
            observations: n,
            parameters: p,
        });
    }

    let xtx = design.x.tr_mul(&design.x);
    let xty = design.x.tr_mul(&design.y);

    let chol = xtx.clone().cholesky().ok_or_else(|| AnalysisError::SingularDesign {
        model: model.to_string(),
        detail: "XᵀX is not positive definite".to_string(),
    })?;

    let l = chol.l();
    for j in 0..p {
        let pivot = l[(j, j)];
        if pivot * pivot <= COLLINEARITY_TOLERANCE * xtx[(j, j)] {
            return Err(AnalysisError::SingularDesign {
                model: model.to_string(),
                detail: format!("column {} is collinear with earlier columns", design.terms[j]),
            });
        }
    }

    let coefficients = chol.solve(&xty);
    let residuals = &design.y - &design.x * &coefficients;
    let sse = residuals.norm_squared();
    let df = (n - p) as f64;
    let sigma2 = sse / df;
    let covariance = chol.inverse() * sigma2;

    let mean = design.y.mean();
    let sst: f64 = design.y.iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 1.0 };

    Ok(OlsFit {
        design,
        coefficients,
        covariance,
        sse,
        sigma: sigma2.sqrt(),
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSpec;
    use crate::types::{CohortGroup, Coordinate, HousingProgram, HousingUnit, MatchedSale, PropertyPoint, SaleRecord};
    use chrono::NaiveDate;

    fn sale(group: CohortGroup, sqft: f64, age: i32, amount: f64) -> MatchedSale {
        MatchedSale {
            sale: SaleRecord {
                apn: "1".to_string(),
                sale_date: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
                amount: Some(amount),
                square_footage: Some(sqft),
                year_built: Some(2010 - age),
                tract: Some("1".to_string()),
                sale_year: 2010,
                age: Some(age),
                point: PropertyPoint {
                    apn: "1".to_string(),
                    location: Coordinate::new(34.0, -118.0),
                },
            },
            housing: HousingUnit {
                id: "h".to_string(),
                year: 2012,
                location: Coordinate::new(34.0, -118.0),
                program: HousingProgram::Lihtc,
            },
            distance_miles: 0.1,
            group,
        }
    }

    fn spec() -> ModelSpec {
        ModelSpec {
            fixed_effects: vec![],
            ..ModelSpec::inside_default()
        }
    }

    #[test]
    fn test_recovers_exact_coefficients() {
        // log(amount) = 5 + 0.8 log(sqft) - 0.01 age + 0.2 [pre]
        let mut rows = Vec::new();
        for (k, sqft) in [900.0, 1200.0, 1500.0, 2100.0, 2600.0].iter().enumerate() {
            for age in [5, 20, 45] {
                for (group, shift) in [(CohortGroup::Outside, 0.0), (CohortGroup::Pre, 0.2)] {
                    let age = age + k as i32;
                    let log_amount = 5.0 + 0.8 * f64::ln(*sqft) - 0.01 * age as f64 + shift;
                    rows.push(sale(group, *sqft, age, log_amount.exp()));
                }
            }
        }

        let design = Design::build(&spec(), &rows).unwrap();
        let fit = fit("exact", design).unwrap();
        assert!((fit.coefficient(&Term::Intercept).unwrap() - 5.0).abs() < 1e-8);
        assert!((fit.coefficient(&Term::LogSqft).unwrap() - 0.8).abs() < 1e-9);
        assert!((fit.coefficient(&Term::Age).unwrap() + 0.01).abs() < 1e-10);
        assert!((fit.coefficient(&Term::Group(CohortGroup::Pre)).unwrap() - 0.2).abs() < 1e-9);
        assert!(fit.sse < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(fit.residual_df(), 30 - 4);
    }

    #[test]
    fn test_noisy_fit_has_positive_variances() {
        let mut rows = Vec::new();
        for i in 0..40 {
            let group = if i % 2 == 0 { CohortGroup::Outside } else { CohortGroup::Pre };
            let sqft = 1000.0 + 37.0 * i as f64;
            let age = 10 + (i * 7) % 30;
            let noise = if i % 3 == 0 { 0.05 } else { -0.025 };
            let log_amount = 4.0 + 1.0 * f64::ln(sqft) + noise;
            rows.push(sale(group, sqft, age, log_amount.exp()));
        }
        let fit = fit("noisy", Design::build(&spec(), &rows).unwrap()).unwrap();
        for j in 0..fit.parameters() {
            assert!(fit.covariance[(j, j)] > 0.0);
        }
        let a = Term::Group(CohortGroup::Pre);
        let b = Term::Age;
        assert_eq!(fit.covariance_between(&a, &b), fit.covariance_between(&b, &a));
        assert!(fit.sigma > 0.0);
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_collinear_column_is_singular() {
        // age is constant, so it duplicates the intercept
        let rows: Vec<MatchedSale> = (0..12)
            .map(|i| {
                let group = if i % 2 == 0 { CohortGroup::Outside } else { CohortGroup::Pre };
                sale(group, 1000.0 + 50.0 * i as f64, 30, 300_000.0 + 1000.0 * i as f64)
            })
            .collect();
        let err = fit("collinear", Design::build(&spec(), &rows).unwrap()).unwrap_err();
        assert!(matches!(err, AnalysisError::SingularDesign { .. }));
    }
}
