use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::FilterConfig;
use crate::observability::metrics;
use crate::types::{CohortGroup, MatchedSale};

/// The filter predicates, in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Distance,
    NotOther,
    NonNegativeAge,
    PositiveSquareFootage,
    PositiveAmount,
    AgePresent,
    YearGap,
    Deduplicate,
    AmountCap,
}

impl FilterStage {
    pub const ALL: [FilterStage; 9] = [
        FilterStage::Distance,
        FilterStage::NotOther,
        FilterStage::NonNegativeAge,
        FilterStage::PositiveSquareFootage,
        FilterStage::PositiveAmount,
        FilterStage::AgePresent,
        FilterStage::YearGap,
        FilterStage::Deduplicate,
        FilterStage::AmountCap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStage::Distance => "distance",
            FilterStage::NotOther => "not_other",
            FilterStage::NonNegativeAge => "non_negative_age",
            FilterStage::PositiveSquareFootage => "positive_square_footage",
            FilterStage::PositiveAmount => "positive_amount",
            FilterStage::AgePresent => "age_present",
            FilterStage::YearGap => "year_gap",
            FilterStage::Deduplicate => "deduplicate",
            FilterStage::AmountCap => "amount_cap",
        }
    }

    /// Row-level predicate. `Deduplicate` depends on earlier rows and is
    /// handled separately, so it accepts every row here.
    fn keep(&self, row: &MatchedSale, limits: &FilterConfig) -> bool {
        let sale = &row.sale;
        match self {
            FilterStage::Distance => row.distance_miles <= limits.max_distance_miles,
            FilterStage::NotOther => row.group != CohortGroup::Other,
            FilterStage::NonNegativeAge => sale.age.is_some_and(|age| age >= 0),
            FilterStage::PositiveSquareFootage => sale.square_footage.is_some_and(|sqft| sqft > 0.0),
            FilterStage::PositiveAmount => sale.amount.is_some_and(|amount| amount > 0.0),
            FilterStage::AgePresent => sale.age.is_some(),
            FilterStage::YearGap => row.year_gap().abs() <= limits.max_year_gap,
            FilterStage::Deduplicate => true,
            FilterStage::AmountCap => sale.amount.is_some_and(|amount| amount <= limits.max_sale_amount),
        }
    }
}

/// Row count before and after one filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: FilterStage,
    pub before: usize,
    pub after: usize,
}

impl StageCount {
    pub fn dropped(&self) -> usize {
        self.before - self.after
    }
}

fn deduplicate(rows: Vec<MatchedSale>) -> Vec<MatchedSale> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter().filter(|row| seen.insert(row.dedupe_key())).collect()
}

/// Apply every filter stage in order, recording the surviving count after each.
///
/// `model` only labels the metrics and log lines.
pub fn apply_filters(
    rows: Vec<MatchedSale>,
    limits: &FilterConfig,
    model: &str,
) -> (Vec<MatchedSale>, Vec<StageCount>) {
    let mut rows = rows;
    let mut counts = Vec::with_capacity(FilterStage::ALL.len());

    for stage in FilterStage::ALL {
        let before = rows.len();
        rows = match stage {
            FilterStage::Deduplicate => deduplicate(rows),
            _ => rows.into_iter().filter(|row| stage.keep(row, limits)).collect(),
        };
        let count = StageCount {
            stage,
            before,
            after: rows.len(),
        };
        debug!(model, stage = stage.as_str(), before, after = count.after, "Filter stage applied");
        metrics::filter::stage_applied(model, stage.as_str(), before, count.after);
        counts.push(count);
    }

    info!("🧹 Model '{}': {} rows survived filtering", model, rows.len());
    (rows, counts)
}
