//! Three-dimensional k-d tree over unit-sphere vectors.
//!
//! Coordinates are embedded as ECEF unit vectors. Chord length between two
//! unit vectors grows monotonically with the great-circle angle, so the
//! Euclidean nearest neighbor in 3-d is the nearest neighbor on the sphere.
//!
//! Ties at exactly equal chord distance go to the smallest key, then to the
//! earliest inserted item, so results never depend on tree shape.

use kiddo::{KdTree as ChordTree, SquaredEuclidean};

use crate::types::Coordinate;

/// Result of a nearest-neighbor query
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a, K> {
    pub key: &'a K,
    /// Position of the item in the slice the tree was built from
    pub index: usize,
    /// Squared chord distance on the unit sphere
    pub chord_sq: f64,
}

pub struct KdTree<K> {
    tree: ChordTree<f64, 3>,
    keys: Vec<K>,
}

pub fn unit_vector(c: Coordinate) -> [f64; 3] {
    let (sin_lat, cos_lat) = c.lat.to_radians().sin_cos();
    let (sin_lng, cos_lng) = c.lng.to_radians().sin_cos();
    [cos_lat * cos_lng, cos_lat * sin_lng, sin_lat]
}

impl<K: Ord> KdTree<K> {
    pub fn build(items: Vec<(Coordinate, K)>) -> Self {
        let mut tree: ChordTree<f64, 3> = ChordTree::with_capacity(items.len().max(1));
        let mut keys = Vec::with_capacity(items.len());
        for (i, (coordinate, key)) in items.into_iter().enumerate() {
            tree.add(&unit_vector(coordinate), i as u64);
            keys.push(key);
        }
        KdTree { tree, keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Nearest item to `query`, or `None` for an empty tree
    pub fn nearest(&self, query: Coordinate) -> Option<Nearest<'_, K>> {
        if self.is_empty() {
            return None;
        }
        let q = unit_vector(query);
        let best = self.tree.nearest_one::<SquaredEuclidean>(&q);

        // padded radius so the nearest shell is returned whether or not the bound is inclusive
        let radius = best.distance + (best.distance * 1e-9).max(f64::EPSILON);
        let index = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&q, radius)
            .into_iter()
            .filter(|n| n.distance <= best.distance)
            .map(|n| n.item as usize)
            .min_by(|&a, &b| self.keys[a].cmp(&self.keys[b]).then(a.cmp(&b)))
            .unwrap_or(best.item as usize);

        Some(Nearest {
            key: &self.keys[index],
            index,
            chord_sq: best.distance,
        })
    }
}
