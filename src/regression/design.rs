//! Model frame and treatment-coded design matrix.
//!
//! Each categorical covariate contributes one indicator column per observed
//! level except its reference. Sale year and tract use their lowest sorted
//! level as reference; the cohort group reference comes from the model spec.

use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::config::{FixedEffect, ModelSpec};
use crate::error::{AnalysisError, Result};
use crate::types::{CohortGroup, MatchedSale};

/// One column of the design matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Intercept,
    LogSqft,
    Age,
    Group(CohortGroup),
    SaleYear(i32),
    Tract(String),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Intercept => write!(f, "(intercept)"),
            Term::LogSqft => write!(f, "log(square_footage)"),
            Term::Age => write!(f, "age"),
            Term::Group(g) => write!(f, "group[{}]", g),
            Term::SaleYear(y) => write!(f, "sale_year[{}]", y),
            Term::Tract(t) => write!(f, "tract[{}]", t),
        }
    }
}

/// A model-frame row: everything the regression needs, nothing missing
#[derive(Debug, Clone, PartialEq)]
struct FrameRow<'a> {
    log_amount: f64,
    log_sqft: f64,
    age: f64,
    group: CohortGroup,
    sale_year: i32,
    tract: Option<&'a str>,
}

fn frame_row<'a>(row: &'a MatchedSale, needs_tract: bool) -> Option<FrameRow<'a>> {
    let sale = &row.sale;
    let amount = sale.amount.filter(|a| *a > 0.0)?;
    let sqft = sale.square_footage.filter(|s| *s > 0.0)?;
    let age = sale.age?;
    let tract = match sale.tract.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Some(t),
        _ if needs_tract => return None,
        _ => None,
    };
    if row.group == CohortGroup::Other {
        return None;
    }
    Some(FrameRow {
        log_amount: amount.ln(),
        log_sqft: sqft.ln(),
        age: age as f64,
        group: row.group,
        sale_year: sale.sale_year,
        tract,
    })
}

/// Response vector, design matrix and the term behind each column
#[derive(Debug, Clone)]
pub struct Design {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub terms: Vec<Term>,
    index: HashMap<Term, usize>,
    /// Rows dropped at frame construction for a missing covariate
    pub dropped_rows: usize,
    group_counts: BTreeMap<CohortGroup, usize>,
}

impl Design {
    /// Build the design for `spec` over an already filtered table
    pub fn build(spec: &ModelSpec, rows: &[MatchedSale]) -> Result<Self> {
        let uses_year = spec.uses(FixedEffect::SaleYear);
        let uses_tract = spec.uses(FixedEffect::Tract);

        let frame: Vec<FrameRow> = rows.iter().filter_map(|r| frame_row(r, uses_tract)).collect();
        let dropped_rows = rows.len() - frame.len();

        let mut group_counts: BTreeMap<CohortGroup, usize> = BTreeMap::new();
        for r in &frame {
            *group_counts.entry(r.group).or_default() += 1;
        }
        let groups: BTreeSet<CohortGroup> = group_counts.keys().copied().collect();
        if !groups.contains(&spec.reference) {
            return Err(AnalysisError::MissingReferenceLevel {
                model: spec.name.clone(),
                group: spec.reference,
            });
        }

        let mut terms = vec![Term::Intercept, Term::LogSqft, Term::Age];
        terms.extend(groups.iter().filter(|g| **g != spec.reference).map(|g| Term::Group(*g)));
        if uses_year {
            let years: BTreeSet<i32> = frame.iter().map(|r| r.sale_year).collect();
            terms.extend(years.into_iter().skip(1).map(Term::SaleYear));
        }
        if uses_tract {
            let tracts: BTreeSet<&str> = frame.iter().filter_map(|r| r.tract).collect();
            terms.extend(tracts.into_iter().skip(1).map(|t| Term::Tract(t.to_string())));
        }

        let n = frame.len();
        let p = terms.len();
        if n <= p {
            return Err(AnalysisError::InsufficientObservations {
                model: spec.name.clone(),
                observations: n,
                parameters: p,
            });
        }

        let index: HashMap<Term, usize> = terms.iter().cloned().enumerate().map(|(i, t)| (t, i)).collect();

        let mut x = DMatrix::<f64>::zeros(n, p);
        let mut y = DVector::<f64>::zeros(n);
        for (i, row) in frame.iter().enumerate() {
            y[i] = row.log_amount;
            x[(i, 0)] = 1.0;
            x[(i, 1)] = row.log_sqft;
            x[(i, 2)] = row.age;
            if let Some(&j) = index.get(&Term::Group(row.group)) {
                x[(i, j)] = 1.0;
            }
            if uses_year {
                if let Some(&j) = index.get(&Term::SaleYear(row.sale_year)) {
                    x[(i, j)] = 1.0;
                }
            }
            if let Some(tract) = row.tract.filter(|_| uses_tract) {
                if let Some(&j) = index.get(&Term::Tract(tract.to_string())) {
                    x[(i, j)] = 1.0;
                }
            }
        }

        Ok(Self {
            x,
            y,
            terms,
            index,
            dropped_rows,
            group_counts,
        })
    }

    pub fn column(&self, term: &Term) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn observations(&self) -> usize {
        self.x.nrows()
    }

    /// Model-frame rows in `group`
    pub fn group_observations(&self, group: CohortGroup) -> usize {
        self.group_counts.get(&group).copied().unwrap_or(0)
    }

    pub fn parameters(&self) -> usize {
        self.x.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinate, Grouping, HousingProgram, HousingUnit, PropertyPoint, SaleRecord};
    use chrono::NaiveDate;

    fn row(group: CohortGroup, year: i32, tract: Option<&str>) -> MatchedSale {
        MatchedSale {
            sale: SaleRecord {
                apn: "1".to_string(),
                sale_date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
                amount: Some(400_000.0),
                square_footage: Some(1500.0),
                year_built: Some(1960),
                tract: tract.map(str::to_string),
                sale_year: year,
                age: Some(year - 1960),
                point: PropertyPoint {
                    apn: "1".to_string(),
                    location: Coordinate::new(34.0, -118.0),
                },
            },
            housing: HousingUnit {
                id: "h".to_string(),
                year: 2010,
                location: Coordinate::new(34.0, -118.0),
                program: HousingProgram::Lihtc,
            },
            distance_miles: 0.2,
            group,
        }
    }

    fn spec(reference: CohortGroup) -> ModelSpec {
        ModelSpec {
            reference,
            ..ModelSpec::inside_default()
        }
    }

    #[test]
    fn test_treatment_coding_drops_reference_levels() {
        let mut rows = Vec::new();
        for (i, group) in [CohortGroup::Pre, CohortGroup::Post, CohortGroup::Outside].iter().enumerate() {
            for year in [2009, 2010, 2011] {
                for tract in ["200", "100"] {
                    let mut r = row(*group, year, Some(tract));
                    r.sale.square_footage = Some(1000.0 + (i * 100 + year as usize % 7) as f64);
                    rows.push(r);
                }
            }
        }

        let design = Design::build(&spec(CohortGroup::Outside), &rows).unwrap();
        assert_eq!(
            design.terms,
            vec![
                Term::Intercept,
                Term::LogSqft,
                Term::Age,
                Term::Group(CohortGroup::Pre),
                Term::Group(CohortGroup::Post),
                Term::SaleYear(2010),
                Term::SaleYear(2011),
                Term::Tract("200".to_string()),
            ]
        );
        assert_eq!(design.observations(), 18);
        assert_eq!(design.column(&Term::Group(CohortGroup::Outside)), None);
        assert_eq!(design.column(&Term::Group(CohortGroup::Post)), Some(4));

        let j = design.column(&Term::Tract("200".to_string())).unwrap();
        assert_eq!(design.x[(0, j)], 1.0);
        assert_eq!(design.x[(1, j)], 0.0);
        assert!((design.y[0] - 400_000f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_missing_reference_level_is_fatal() {
        let rows: Vec<MatchedSale> = (0..10).map(|_| row(CohortGroup::Pre, 2010, Some("1"))).collect();
        let err = Design::build(&spec(CohortGroup::Outside), &rows).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MissingReferenceLevel { group: CohortGroup::Outside, .. }
        ));
    }

    #[test]
    fn test_rows_without_tract_are_dropped_and_counted() {
        let mut rows: Vec<MatchedSale> = (0..6).map(|i| row(CohortGroup::Outside, 2010 + i % 2, Some("1"))).collect();
        rows.push(row(CohortGroup::Pre, 2010, None));
        rows.push(row(CohortGroup::Pre, 2010, Some("  ")));
        for r in rows.iter_mut().take(3) {
            r.group = CohortGroup::Pre;
        }
        let design = Design::build(&spec(CohortGroup::Outside), &rows).unwrap();
        assert_eq!(design.dropped_rows, 2);
        assert_eq!(design.observations(), 6);
        assert_eq!(design.group_observations(CohortGroup::Pre), 3);
        assert_eq!(design.group_observations(CohortGroup::Outside), 3);
        assert_eq!(design.group_observations(CohortGroup::Post), 0);

        let no_tract = ModelSpec {
            fixed_effects: vec![FixedEffect::SaleYear],
            ..spec(CohortGroup::Outside)
        };
        let design = Design::build(&no_tract, &rows).unwrap();
        assert_eq!(design.dropped_rows, 0);
        assert!(design.terms.iter().all(|t| !matches!(t, Term::Tract(_))));
    }

    #[test]
    fn test_too_few_rows_for_parameters() {
        let rows = vec![row(CohortGroup::Outside, 2010, Some("1")), row(CohortGroup::Pre, 2011, Some("2"))];
        let err = Design::build(&spec(CohortGroup::Outside), &rows).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientObservations { observations: 2, .. }));
    }

    #[test]
    fn test_full_grouping_reference() {
        let spec = ModelSpec {
            fixed_effects: vec![],
            ..ModelSpec::full_default()
        };
        assert_eq!(spec.grouping, Grouping::Full);
        let rows: Vec<MatchedSale> = [CohortGroup::OutsidePre, CohortGroup::Post, CohortGroup::OutsidePost]
            .iter()
            .cycle()
            .take(9)
            .map(|g| row(*g, 2010, Some("1")))
            .collect();
        let design = Design::build(&spec, &rows).unwrap();
        assert_eq!(
            design.terms[3..],
            [Term::Group(CohortGroup::Post), Term::Group(CohortGroup::OutsidePost)]
        );
    }
}
