use std::collections::HashMap;
use tracing::info;

use crate::observability::metrics;
use crate::pipeline::processing::normalize::{PropertyDetail, SaleEvent};
use crate::types::SaleRecord;

/// Inner join of sales to parcels on `apn`.
///
/// A sale whose parcel appears more than once yields one record per parcel
/// row; a sale with no parcel row is dropped. Output follows sale order.
/// Returns the joined records and the number of sales left unmatched.
pub fn join_sales_to_properties(
    sales: &[SaleEvent],
    properties: &[PropertyDetail],
) -> (Vec<SaleRecord>, usize) {
    let mut by_apn: HashMap<&str, Vec<&PropertyDetail>> = HashMap::new();
    for property in properties {
        by_apn.entry(property.point.apn.as_str()).or_default().push(property);
    }

    let mut joined = Vec::with_capacity(sales.len());
    let mut unmatched = 0usize;
    for sale in sales {
        let Some(parcels) = by_apn.get(sale.apn.as_str()) else {
            unmatched += 1;
            continue;
        };
        for property in parcels {
            joined.push(SaleRecord {
                apn: sale.apn.clone(),
                sale_date: sale.sale_date,
                amount: sale.amount,
                square_footage: property.square_footage,
                year_built: property.year_built,
                tract: property.tract.clone(),
                sale_year: sale.sale_year,
                age: property.year_built.map(|built| sale.sale_year - built),
                point: property.point.clone(),
            });
        }
    }

    metrics::join::rows_matched(joined.len());
    metrics::join::rows_unmatched(unmatched);
    info!("🔗 Joined {} sales to parcels ({} without a parcel)", joined.len(), unmatched);
    (joined, unmatched)
}
