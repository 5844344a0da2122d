use tracing::{info, instrument};

use crate::error::{AnalysisError, Result};
use crate::observability::metrics;
use crate::spatial::{geodesic_miles, KdTree};
use crate::types::{CohortGroup, HousingProgram, HousingUnit, MatchedSale, SaleRecord};

/// Nearest-neighbor index over housing units.
///
/// Keys are `(id, program)`, so equidistant units resolve to the lowest id.
pub struct HousingIndex<'a> {
    units: &'a [HousingUnit],
    tree: KdTree<(String, HousingProgram)>,
}

impl<'a> HousingIndex<'a> {
    pub fn build(units: &'a [HousingUnit]) -> Result<Self> {
        if units.is_empty() {
            return Err(AnalysisError::NoHousingUnits);
        }
        let tree = KdTree::build(
            units
                .iter()
                .map(|u| (u.location, (u.id.clone(), u.program)))
                .collect(),
        );
        Ok(Self { units, tree })
    }

    /// Nearest unit to `sale` and the geodesic distance to it in miles
    pub fn nearest(&self, sale: &SaleRecord) -> Option<(&'a HousingUnit, f64)> {
        let hit = self.tree.nearest(sale.point.location)?;
        let unit = &self.units[hit.index];
        Some((unit, geodesic_miles(sale.point.location, unit.location)))
    }
}

/// Match every sale to its nearest housing unit.
///
/// Groups start as `Other`; the classification pass labels them per model.
#[instrument(skip_all, fields(sales = sales.len(), housing_units = units.len()))]
pub fn match_sales(sales: Vec<SaleRecord>, units: &[HousingUnit]) -> Result<Vec<MatchedSale>> {
    let index = HousingIndex::build(units)?;

    let mut matched = Vec::with_capacity(sales.len());
    for sale in sales {
        let Some((unit, distance_miles)) = index.nearest(&sale) else {
            continue;
        };
        metrics::matching::sale_matched(distance_miles);
        matched.push(MatchedSale {
            sale,
            housing: unit.clone(),
            distance_miles,
            group: CohortGroup::Other,
        });
    }

    info!("📍 Matched {} sales to their nearest housing unit", matched.len());
    Ok(matched)
}
