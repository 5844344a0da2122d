// Spatial primitives: geodesic distance and nearest-neighbor index

pub mod geodesic;
pub mod kdtree;

pub use geodesic::{geodesic_miles, meters_to_miles, miles_to_meters};
pub use kdtree::{KdTree, Nearest};
