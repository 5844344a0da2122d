/// Constants shared across pipeline stages so thresholds stay consistent
/// between classification, filtering and reporting.

// Distance conversion
pub const METERS_PER_MILE: f64 = 1609.34;

// Classification radii (miles)
pub const INNER_RADIUS_MILES: f64 = 0.5;
pub const OUTER_RADIUS_MILES: f64 = 1.0;

// Classification year windows, measured as housing_year - sale_year
pub const PRE_MIN_YEARS: i32 = 2;
pub const PRE_MAX_YEARS: i32 = 5;
pub const MID_MIN_YEARS: i32 = 0;
pub const MID_MAX_YEARS_EXCLUSIVE: i32 = 2;

// Filter defaults
pub const MAX_YEAR_GAP: i32 = 5;
pub const MAX_SALE_AMOUNT: f64 = 10_000_000.0;

// Housing establishment year sanity range [min, max)
pub const HOUSING_YEAR_MIN: i32 = 2000;
pub const HOUSING_YEAR_MAX: i32 = 5000;

// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.96;

// Input column names that are not valid Rust identifiers or need renaming
pub const LIHTC_ID_COLUMN: &str = "HUD_ID";
pub const LIHTC_YEAR_COLUMN: &str = "YR_PIS";
pub const BARNES_YEAR_COLUMN: &str = "Barnes.Year";

/// Prefix for generated LIHTC ids, used when `HUD_ID` is blank
pub const LIHTC_ID_PREFIX: &str = "lihtc-";

/// Prefix for generated Barnes ids, since that file carries no identifier
pub const BARNES_ID_PREFIX: &str = "barnes-";
