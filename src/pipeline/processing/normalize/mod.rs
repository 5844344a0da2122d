use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::config::FilterConfig;
use crate::constants::{BARNES_ID_PREFIX, LIHTC_ID_PREFIX};
use crate::error::{AnalysisError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::{
    RawBarnesRow, RawLihtcRow, RawPropertyRow, RawSaleRow, BARNES_TABLE, LIHTC_TABLE, PROPERTY_TABLE,
    SALES_TABLE,
};
use crate::types::{Coordinate, HousingProgram, HousingUnit, PropertyPoint};

/// Sale row with a parsed date and derived sale year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub apn: String,
    pub sale_date: NaiveDate,
    pub sale_year: i32,
    pub amount: Option<f64>,
}

/// Property row with its centroid split into a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetail {
    pub point: PropertyPoint,
    pub tract: Option<String>,
    pub square_footage: Option<f64>,
    pub year_built: Option<i32>,
}

/// Row counts in and out of normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    pub lihtc_rows: usize,
    pub barnes_rows: usize,
    pub housing_units: usize,
    pub housing_dropped: usize,
    pub sales_rows: usize,
    pub sales_dropped: usize,
    pub property_rows: usize,
    pub properties_dropped: usize,
}

/// Unified-schema fields before the year-range check
#[derive(Debug, Clone, PartialEq)]
pub struct HousingCandidate {
    pub id: String,
    pub year: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Maps one housing program's raw rows onto the unified (id, year, coordinate, type) schema
pub trait HousingSource {
    const PROGRAM: HousingProgram;

    /// `row` is the zero-based position in the source file
    fn candidate(&self, row: usize) -> HousingCandidate;
}

impl HousingSource for RawLihtcRow {
    const PROGRAM: HousingProgram = HousingProgram::Lihtc;

    fn candidate(&self, row: usize) -> HousingCandidate {
        let id = match self.hud_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}{}", LIHTC_ID_PREFIX, row),
        };
        HousingCandidate {
            id,
            year: self.year_placed_in_service,
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

impl HousingSource for RawBarnesRow {
    const PROGRAM: HousingProgram = HousingProgram::Barnes;

    fn candidate(&self, row: usize) -> HousingCandidate {
        HousingCandidate {
            id: format!("{}{}", BARNES_ID_PREFIX, row),
            year: self.year,
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Year-range predicate: `min <= year < max`. Missing years fail.
pub fn housing_year_in_range(year: Option<f64>, filters: &FilterConfig) -> bool {
    match year {
        Some(y) => y >= filters.housing_year_min as f64 && y < filters.housing_year_max as f64,
        None => false,
    }
}

/// Normalize one program's rows; rows failing the predicate are dropped silently
pub fn normalize_program<S: HousingSource>(rows: &[S], filters: &FilterConfig) -> Vec<HousingUnit> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let c = row.candidate(i);
            if !housing_year_in_range(c.year, filters) {
                return None;
            }
            let location = Coordinate::new(c.lat?, c.lng?);
            if !location.is_valid() {
                return None;
            }
            Some(HousingUnit {
                id: c.id,
                year: c.year?.trunc() as i32,
                location,
                program: S::PROGRAM,
            })
        })
        .collect()
}

/// Merge both housing programs into a single list
pub fn normalize_housing(
    lihtc: &[RawLihtcRow],
    barnes: &[RawBarnesRow],
    filters: &FilterConfig,
) -> Vec<HousingUnit> {
    let mut units = normalize_program(lihtc, filters);
    let lihtc_kept = units.len();
    units.extend(normalize_program(barnes, filters));

    metrics::normalize::rows_dropped(LIHTC_TABLE, lihtc.len() - lihtc_kept);
    metrics::normalize::rows_dropped(BARNES_TABLE, barnes.len() - (units.len() - lihtc_kept));
    metrics::normalize::housing_units(units.len());
    info!(
        "🏘️  Normalized {} housing units ({} LIHTC, {} Barnes)",
        units.len(),
        lihtc_kept,
        units.len() - lihtc_kept
    );
    units
}

/// Parse a sale date in any of the accepted layouts
pub fn parse_sale_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // compact yyyymmdd
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s[0..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.date_naive());
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

pub fn normalize_sales(rows: &[RawSaleRow]) -> Result<Vec<SaleEvent>> {
    let mut sales = Vec::with_capacity(rows.len());
    for row in rows {
        let apn = row.apn.trim();
        if apn.is_empty() {
            continue;
        }
        let Some(raw_date) = row.ownerdate.as_deref().filter(|d| !d.trim().is_empty()) else {
            debug!(apn, "Dropping sale with no date");
            continue;
        };
        let sale_date = parse_sale_date(raw_date).ok_or_else(|| AnalysisError::InvalidDate {
            apn: apn.to_string(),
            value: raw_date.to_string(),
        })?;
        sales.push(SaleEvent {
            apn: apn.to_string(),
            sale_date,
            sale_year: sale_date.year(),
            amount: row.amount,
        });
    }
    metrics::normalize::rows_dropped(SALES_TABLE, rows.len() - sales.len());
    Ok(sales)
}

fn number_pattern() -> Option<&'static Regex> {
    static NUMBER_RE: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER_RE
        .get_or_init(|| Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").ok())
        .as_ref()
}

/// Split a combined coordinate field into latitude/longitude.
///
/// `POINT (lng lat)` is read in WKT axis order; anything else holding two
/// numbers is read as `lat, lng`.
pub fn parse_centroid(raw: &str) -> Option<Coordinate> {
    let s = raw.trim();
    let numbers: Vec<f64> = number_pattern()?
        .find_iter(s)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect();
    if numbers.len() != 2 {
        return None;
    }
    let coordinate = if s.to_ascii_uppercase().starts_with("POINT") {
        Coordinate::new(numbers[1], numbers[0])
    } else {
        Coordinate::new(numbers[0], numbers[1])
    };
    coordinate.is_valid().then_some(coordinate)
}

pub fn normalize_properties(rows: &[RawPropertyRow]) -> Result<Vec<PropertyDetail>> {
    let mut properties = Vec::with_capacity(rows.len());
    for row in rows {
        let apn = row.apn.trim();
        if apn.is_empty() {
            continue;
        }
        let Some(raw_centroid) = row.centroid.as_deref().filter(|c| !c.trim().is_empty()) else {
            debug!(apn, "Dropping property with no centroid");
            continue;
        };
        let location = parse_centroid(raw_centroid).ok_or_else(|| AnalysisError::InvalidCoordinate {
            apn: apn.to_string(),
            value: raw_centroid.to_string(),
        })?;
        properties.push(PropertyDetail {
            point: PropertyPoint {
                apn: apn.to_string(),
                location,
            },
            tract: row
                .tract
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            square_footage: row.square_footage,
            year_built: row.year_built.filter(|y| y.is_finite()).map(|y| y.trunc() as i32),
        });
    }
    metrics::normalize::rows_dropped(PROPERTY_TABLE, rows.len() - properties.len());
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lihtc(id: &str, year: Option<f64>, lat: f64, lng: f64) -> RawLihtcRow {
        RawLihtcRow {
            hud_id: Some(id.to_string()),
            year_placed_in_service: year,
            latitude: Some(lat),
            longitude: Some(lng),
        }
    }

    #[test]
    fn test_housing_year_filter_bounds() {
        let filters = FilterConfig::default();
        assert!(!housing_year_in_range(Some(1999.0), &filters));
        assert!(housing_year_in_range(Some(2000.0), &filters));
        assert!(housing_year_in_range(Some(4999.0), &filters));
        assert!(!housing_year_in_range(Some(5000.0), &filters));
        assert!(!housing_year_in_range(Some(8888.0), &filters));
        assert!(!housing_year_in_range(None, &filters));
    }

    #[test]
    fn test_normalize_housing_unifies_programs() {
        let filters = FilterConfig::default();
        let lihtc_rows = vec![
            lihtc("CAA001", Some(2004.0), 34.0, -118.0),
            lihtc("CAA002", Some(9999.0), 34.1, -118.1),
            lihtc("CAA003", None, 34.1, -118.1),
            RawLihtcRow {
                hud_id: Some("CAA004".to_string()),
                year_placed_in_service: Some(2010.0),
                latitude: None,
                longitude: Some(-118.2),
            },
        ];
        let barnes_rows = vec![
            RawBarnesRow { year: Some(1995.0), lat: Some(34.2), lng: Some(-118.2) },
            RawBarnesRow { year: Some(2012.0), lat: Some(34.3), lng: Some(-118.3) },
        ];

        let units = normalize_housing(&lihtc_rows, &barnes_rows, &filters);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id, "CAA001");
        assert_eq!(units[0].program, HousingProgram::Lihtc);
        assert_eq!(units[0].year, 2004);
        assert_eq!(units[1].id, "barnes-1");
        assert_eq!(units[1].program, HousingProgram::Barnes);
        assert_eq!(units[1].location, Coordinate::new(34.3, -118.3));
    }

    #[test]
    fn test_blank_lihtc_id_gets_row_id() {
        let filters = FilterConfig::default();
        let rows = vec![
            lihtc("CAA001", Some(2004.0), 34.0, -118.0),
            RawLihtcRow {
                hud_id: None,
                year_placed_in_service: Some(2010.0),
                latitude: Some(34.0),
                longitude: Some(-118.0),
            },
            lihtc("  ", Some(2011.0), 34.1, -118.1),
        ];

        let units = normalize_housing(&rows, &[], &filters);
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["CAA001", "lihtc-1", "lihtc-2"]);
        assert_eq!(units[1].year, 2010);
        assert_eq!(units[1].program, HousingProgram::Lihtc);
    }

    #[test]
    fn test_parse_sale_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2010, 6, 15);
        assert_eq!(parse_sale_date("2010-06-15"), expected);
        assert_eq!(parse_sale_date("06/15/2010"), expected);
        assert_eq!(parse_sale_date("2010-06-15 00:00:00"), expected);
        assert_eq!(parse_sale_date("2010-06-15T12:30:00Z"), expected);
        assert_eq!(parse_sale_date("2010-06-15T12:30:00"), expected);
        assert_eq!(parse_sale_date("20100615"), expected);
        assert_eq!(parse_sale_date(" 2010/06/15 "), expected);
        assert_eq!(parse_sale_date("not a date"), None);
        assert_eq!(parse_sale_date(""), None);
    }

    #[test]
    fn test_normalize_sales_derives_year_and_drops_blank_dates() {
        let rows = vec![
            RawSaleRow { apn: "1".to_string(), ownerdate: Some("2011-03-02".to_string()), amount: Some(1.0) },
            RawSaleRow { apn: "2".to_string(), ownerdate: None, amount: Some(2.0) },
            RawSaleRow { apn: " ".to_string(), ownerdate: Some("2011-03-02".to_string()), amount: Some(3.0) },
        ];
        let sales = normalize_sales(&rows).unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].sale_year, 2011);
    }

    #[test]
    fn test_unparseable_sale_date_is_fatal() {
        let rows = vec![RawSaleRow {
            apn: "9".to_string(),
            ownerdate: Some("last tuesday".to_string()),
            amount: None,
        }];
        assert!(matches!(normalize_sales(&rows), Err(AnalysisError::InvalidDate { .. })));
    }

    #[test]
    fn test_parse_centroid_axis_orders() {
        assert_eq!(parse_centroid("(34.05, -118.25)"), Some(Coordinate::new(34.05, -118.25)));
        assert_eq!(parse_centroid("34.05,-118.25"), Some(Coordinate::new(34.05, -118.25)));
        assert_eq!(parse_centroid("POINT (-118.25 34.05)"), Some(Coordinate::new(34.05, -118.25)));
        assert_eq!(parse_centroid("point(-118.25 34.05)"), Some(Coordinate::new(34.05, -118.25)));
        assert_eq!(parse_centroid("34.05"), None);
        assert_eq!(parse_centroid("(134.05, -118.25)"), None);
    }

    #[test]
    fn test_normalize_properties() {
        let rows = vec![
            RawPropertyRow {
                apn: "5001".to_string(),
                centroid: Some("(34.0, -118.0)".to_string()),
                tract: Some(" 2071.01 ".to_string()),
                square_footage: Some(1200.0),
                year_built: Some(1962.0),
            },
            RawPropertyRow {
                apn: "5002".to_string(),
                centroid: None,
                tract: None,
                square_footage: None,
                year_built: None,
            },
        ];
        let props = normalize_properties(&rows).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].tract.as_deref(), Some("2071.01"));
        assert_eq!(props[0].year_built, Some(1962));

        let bad = vec![RawPropertyRow {
            apn: "5003".to_string(),
            centroid: Some("somewhere".to_string()),
            tract: None,
            square_footage: None,
            year_built: None,
        }];
        assert!(matches!(
            normalize_properties(&bad),
            Err(AnalysisError::InvalidCoordinate { .. })
        ));
    }
}
