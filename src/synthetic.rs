//! Seeded synthetic inputs in the four CSV schemas.
//!
//! Parcels are scattered around subsidized units so every cohort is
//! populated, and sale prices carry a known premium for sales made within
//! the inner radius after the nearest unit was established. A sprinkling of
//! bad rows (junk years, blank centroids, price outliers, duplicates,
//! unmatched parcels) exercises the normalization and filter stages.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::InputConfig;
use crate::constants::{
    BARNES_YEAR_COLUMN, INNER_RADIUS_MILES, LIHTC_ID_COLUMN, LIHTC_YEAR_COLUMN, MAX_SALE_AMOUNT,
};
use crate::error::{AnalysisError, Result};
use crate::spatial::geodesic_miles;
use crate::types::Coordinate;

const CENTER: Coordinate = Coordinate {
    lat: 34.05,
    lng: -118.25,
};
const HALF_SPAN_DEG: f64 = 0.05;
const TRACT_GRID: usize = 4;
const MILES_PER_DEGREE_LAT: f64 = 69.0;
const SCATTER_MILES: f64 = 1.2;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub sales: usize,
    pub lihtc_units: usize,
    pub barnes_units: usize,
    /// Log-price premium for inner-radius sales after development
    pub planted_effect: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sales: 2000,
            lihtc_units: 12,
            barnes_units: 6,
            planted_effect: 0.10,
        }
    }
}

/// Row counts actually written
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSummary {
    pub housing_rows: usize,
    pub parcels: usize,
    pub sale_rows: usize,
}

#[derive(Debug, Clone, Copy)]
struct Site {
    location: Coordinate,
    year: i32,
}

#[derive(Debug, Clone)]
struct Parcel {
    apn: String,
    location: Coordinate,
    tract: String,
    square_footage: f64,
    year_built: i32,
    nearest_miles: f64,
    nearest_year: i32,
}

fn random_site(rng: &mut StdRng) -> Site {
    Site {
        location: Coordinate::new(
            CENTER.lat + rng.gen_range(-0.8..0.8) * HALF_SPAN_DEG,
            CENTER.lng + rng.gen_range(-0.8..0.8) * HALF_SPAN_DEG,
        ),
        year: rng.gen_range(2004..=2014),
    }
}

/// Point at `miles` from `origin` along `bearing` (radians), flat-earth approximation
fn offset(origin: Coordinate, miles: f64, bearing: f64) -> Coordinate {
    let dlat = miles * bearing.cos() / MILES_PER_DEGREE_LAT;
    let dlng = miles * bearing.sin() / (MILES_PER_DEGREE_LAT * origin.lat.to_radians().cos());
    Coordinate::new(origin.lat + dlat, origin.lng + dlng)
}

fn tract_of(location: Coordinate) -> String {
    let cell = |value: f64, center: f64| {
        let t = (value - center + HALF_SPAN_DEG) / (2.0 * HALF_SPAN_DEG);
        ((t * TRACT_GRID as f64).floor().max(0.0) as usize).min(TRACT_GRID - 1)
    };
    format!("2071.{}{}", cell(location.lat, CENTER.lat), cell(location.lng, CENTER.lng))
}

/// Standard normal draw (Box-Muller)
fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn nearest(location: Coordinate, sites: &[Site]) -> (f64, i32) {
    sites
        .iter()
        .map(|s| (geodesic_miles(location, s.location), s.year))
        .fold((f64::INFINITY, 0), |best, cur| if cur.0 < best.0 { cur } else { best })
}

/// Write the four input files into `dir` and return their paths
pub fn generate(dir: &Path, cfg: &SyntheticConfig) -> Result<(InputConfig, SyntheticSummary)> {
    fs::create_dir_all(dir)?;
    let inputs = InputConfig::in_dir(dir);
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let lihtc_sites: Vec<Site> = (0..cfg.lihtc_units).map(|_| random_site(&mut rng)).collect();
    let barnes_sites: Vec<Site> = (0..cfg.barnes_units).map(|_| random_site(&mut rng)).collect();
    let sites: Vec<Site> = lihtc_sites.iter().chain(barnes_sites.iter()).copied().collect();
    if sites.is_empty() {
        return Err(AnalysisError::Config(
            "synthetic data needs at least one housing unit".to_string(),
        ));
    }

    let mut housing_rows = 0;
    let mut wtr = csv::Writer::from_path(&inputs.lihtc)?;
    wtr.write_record([LIHTC_ID_COLUMN, "PROJECT", LIHTC_YEAR_COLUMN, "LATITUDE", "LONGITUDE"])?;
    for (i, site) in lihtc_sites.iter().enumerate() {
        wtr.write_record([
            format!("CAA{:05}", 1000 + i * 7),
            format!("Project {}", i),
            site.year.to_string(),
            format!("{:.6}", site.location.lat),
            format!("{:.6}", site.location.lng),
        ])?;
        housing_rows += 1;
    }
    // rows the year-range check rejects, plus one without a latitude
    for (i, year) in ["9999", "8888", "1987"].iter().enumerate() {
        let junk = random_site(&mut rng);
        wtr.write_record([
            format!("CAX{:05}", i),
            "Junk".to_string(),
            year.to_string(),
            format!("{:.6}", junk.location.lat),
            format!("{:.6}", junk.location.lng),
        ])?;
        housing_rows += 1;
    }
    wtr.write_record(["CAX99999", "No latitude", "2008", "", "-118.25"])?;
    housing_rows += 1;
    wtr.flush()?;

    let mut wtr = csv::Writer::from_path(&inputs.barnes)?;
    wtr.write_record([BARNES_YEAR_COLUMN, "lat", "lng"])?;
    for site in &barnes_sites {
        wtr.write_record([
            site.year.to_string(),
            format!("{:.6}", site.location.lat),
            format!("{:.6}", site.location.lng),
        ])?;
        housing_rows += 1;
    }
    let junk = random_site(&mut rng);
    wtr.write_record([
        "1990".to_string(),
        format!("{:.6}", junk.location.lat),
        format!("{:.6}", junk.location.lng),
    ])?;
    housing_rows += 1;
    wtr.flush()?;

    let parcel_count = (cfg.sales * 4 / 5).max(1);
    let mut parcels = Vec::with_capacity(parcel_count);
    for i in 0..parcel_count {
        let anchor = sites[rng.gen_range(0..sites.len())];
        let miles = SCATTER_MILES * rng.gen::<f64>().sqrt();
        let location = offset(anchor.location, miles, rng.gen_range(0.0..std::f64::consts::TAU));
        let (nearest_miles, nearest_year) = nearest(location, &sites);
        parcels.push(Parcel {
            apn: format!("{}", 5_100_000_000u64 + i as u64 * 13),
            location,
            tract: tract_of(location),
            square_footage: rng.gen_range(750.0..3600.0_f64).round(),
            year_built: rng.gen_range(1920..=2005),
            nearest_miles,
            nearest_year,
        });
    }

    let mut wtr = csv::Writer::from_path(&inputs.property_details)?;
    wtr.write_record(["apn", "centroid", "tract", "square_footage", "year_built", "use_code"])?;
    for (i, p) in parcels.iter().enumerate() {
        let centroid = match i % 100 {
            0 => String::new(),
            n if n % 2 == 0 => format!("POINT ({:.6} {:.6})", p.location.lng, p.location.lat),
            _ => format!("({:.6}, {:.6})", p.location.lat, p.location.lng),
        };
        let square_footage = if i % 50 == 7 { "0".to_string() } else { p.square_footage.to_string() };
        let year_built = match i % 97 {
            3 => String::new(),
            5 => "2030".to_string(),
            _ => p.year_built.to_string(),
        };
        wtr.write_record([
            p.apn.clone(),
            centroid,
            p.tract.clone(),
            square_footage,
            year_built,
            "0100".to_string(),
        ])?;
    }
    wtr.flush()?;

    let mut sale_rows = 0;
    let mut wtr = csv::Writer::from_path(&inputs.sales)?;
    wtr.write_record(["apn", "ownerdate", "amount", "doc_type"])?;
    for i in 0..cfg.sales {
        let p = &parcels[rng.gen_range(0..parcels.len())];
        let year = rng.gen_range(2000..=2019);
        let Some(date) = NaiveDate::from_ymd_opt(year, rng.gen_range(1..=12), rng.gen_range(1..=28)) else {
            continue;
        };

        let age = (year - p.year_built).max(0) as f64;
        let mut log_price = 9.0 + 0.55 * p.square_footage.ln() - 0.003 * age + 0.03 * (year - 2000) as f64;
        if p.nearest_miles <= INNER_RADIUS_MILES && year > p.nearest_year {
            log_price += cfg.planted_effect;
        }
        log_price += 0.12 * normal(&mut rng);

        let amount = match i % 200 {
            11 => "0".to_string(),
            17 => format!("{:.0}", MAX_SALE_AMOUNT * 2.5),
            23 => String::new(),
            _ => format!("{:.0}", log_price.exp()),
        };
        let apn = if i % 50 == 29 { format!("999{}", i) } else { p.apn.clone() };
        let ownerdate = match i % 3 {
            0 => date.format("%m/%d/%Y").to_string(),
            _ => date.format("%Y-%m-%d").to_string(),
        };
        let ownerdate = if i % 150 == 41 { String::new() } else { ownerdate };

        let record = [apn, ownerdate, amount, "GD".to_string()];
        wtr.write_record(&record)?;
        sale_rows += 1;
        if i % 60 == 5 {
            wtr.write_record(&record)?;
            sale_rows += 1;
        }
    }
    wtr.flush()?;

    let summary = SyntheticSummary {
        housing_rows,
        parcels: parcels.len(),
        sale_rows,
    };
    info!(
        "🧪 Generated synthetic inputs in {} ({} housing rows, {} parcels, {} sales)",
        dir.display(),
        summary.housing_rows,
        summary.parcels,
        summary.sale_rows
    );
    Ok((inputs, summary))
}
