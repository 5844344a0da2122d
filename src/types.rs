use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// WGS84 latitude/longitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// The public program a subsidized housing unit was funded by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousingProgram {
    Lihtc,
    Barnes,
}

impl fmt::Display for HousingProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HousingProgram::Lihtc => write!(f, "lihtc"),
            HousingProgram::Barnes => write!(f, "barnes"),
        }
    }
}

/// A subsidized housing unit in the unified (id, year, coordinate, type) schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingUnit {
    pub id: String,
    pub year: i32,
    pub location: Coordinate,
    pub program: HousingProgram,
}

/// Parcel location taken from the property details table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPoint {
    pub apn: String,
    pub location: Coordinate,
}

/// A sale joined to its parcel's details.
///
/// Numeric fields stay optional here; missing values are removed by the
/// filter stage rather than at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub apn: String,
    pub sale_date: NaiveDate,
    pub amount: Option<f64>,
    pub square_footage: Option<f64>,
    pub year_built: Option<i32>,
    pub tract: Option<String>,
    pub sale_year: i32,
    pub age: Option<i32>,
    pub point: PropertyPoint,
}

/// Cohort label relating a sale to its nearest housing unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortGroup {
    Pre,
    Mid,
    Post,
    Outside,
    OutsidePre,
    OutsideMid,
    OutsidePost,
    Other,
}

impl CohortGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CohortGroup::Pre => "pre",
            CohortGroup::Mid => "mid",
            CohortGroup::Post => "post",
            CohortGroup::Outside => "outside",
            CohortGroup::OutsidePre => "outside_pre",
            CohortGroup::OutsideMid => "outside_mid",
            CohortGroup::OutsidePost => "outside_post",
            CohortGroup::Other => "other",
        }
    }
}

impl fmt::Display for CohortGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CohortGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pre" => Ok(CohortGroup::Pre),
            "mid" => Ok(CohortGroup::Mid),
            "post" => Ok(CohortGroup::Post),
            "outside" => Ok(CohortGroup::Outside),
            "outside_pre" => Ok(CohortGroup::OutsidePre),
            "outside_mid" => Ok(CohortGroup::OutsideMid),
            "outside_post" => Ok(CohortGroup::OutsidePost),
            "other" => Ok(CohortGroup::Other),
            other => Err(format!("unknown cohort group '{}'", other)),
        }
    }
}

/// Which classification variant a model uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// pre / mid / post inside the inner radius, a single `outside` ring beyond it
    InsideOnly,
    /// the outer ring split into outside_pre / outside_mid / outside_post
    Full,
}

impl Grouping {
    /// Labels this grouping can emit, excluding the discarded `other`
    pub fn levels(&self) -> &'static [CohortGroup] {
        match self {
            Grouping::InsideOnly => &[
                CohortGroup::Pre,
                CohortGroup::Mid,
                CohortGroup::Post,
                CohortGroup::Outside,
            ],
            Grouping::Full => &[
                CohortGroup::Pre,
                CohortGroup::Mid,
                CohortGroup::Post,
                CohortGroup::OutsidePre,
                CohortGroup::OutsideMid,
                CohortGroup::OutsidePost,
            ],
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::InsideOnly => write!(f, "inside_only"),
            Grouping::Full => write!(f, "full"),
        }
    }
}

/// A sale matched to its nearest subsidized housing unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSale {
    pub sale: SaleRecord,
    pub housing: HousingUnit,
    pub distance_miles: f64,
    pub group: CohortGroup,
}

impl MatchedSale {
    /// Signed gap between the sale and the housing unit's establishment year
    pub fn year_gap(&self) -> i32 {
        self.sale.sale_year - self.housing.year
    }

    /// Key under which two rows count as identical for de-duplication.
    ///
    /// `f64` Display output round-trips, so equal keys mean equal values.
    pub fn dedupe_key(&self) -> String {
        let s = &self.sale;
        format!(
            "{}|{}|{:?}|{:?}|{:?}|{:?}|{}|{:?}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            s.apn,
            s.sale_date,
            s.amount,
            s.square_footage,
            s.year_built,
            s.tract,
            s.sale_year,
            s.age,
            s.point.location.lat,
            s.point.location.lng,
            self.housing.id,
            self.housing.program,
            self.housing.year,
            self.housing.location.lat,
            self.housing.location.lng,
            self.distance_miles,
            self.group,
        )
    }
}
