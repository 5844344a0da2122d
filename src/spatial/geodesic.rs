//! Distances on the WGS84 ellipsoid.

use geo::{Distance, Geodesic, Point};

use crate::constants::METERS_PER_MILE;
use crate::types::Coordinate;

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}

fn point(c: Coordinate) -> Point<f64> {
    Point::new(c.lng, c.lat)
}

/// Ellipsoidal geodesic distance in meters
pub fn geodesic_m(a: Coordinate, b: Coordinate) -> f64 {
    Geodesic::distance(point(a), point(b))
}

/// Geodesic distance in miles
pub fn geodesic_miles(a: Coordinate, b: Coordinate) -> f64 {
    meters_to_miles(geodesic_m(a, b))
}
