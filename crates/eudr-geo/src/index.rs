//! # Spatial Index
//!
//! Bulk-loaded R-tree over the bounding envelopes of a reference set.
//! [`SpatialIndex::query`] returns the positions of every geometry whose
//! envelope intersects the query envelope. That is a superset of the true
//! intersectors; exact tests happen in the engine.
//!
//! Empty geometries have no envelope and are never returned. An index built
//! from an empty set returns no candidates for any query.

use geo::BoundingRect;
use geo_types::MultiPolygon;
use rstar::{RTree, RTreeObject, AABB};

#[derive(Clone, Debug)]
struct IndexedEnvelope {
    position: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

fn envelope_of(geometry: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = geometry.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

/// Envelope index over a slice of geometries, addressed by position.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
}

impl SpatialIndex {
    /// Build the index in one bulk load.
    ///
    /// Positions in query results refer to the iteration order of
    /// `geometries`.
    pub fn build<'a, I>(geometries: I) -> Self
    where
        I: IntoIterator<Item = &'a MultiPolygon<f64>>,
    {
        let entries: Vec<IndexedEnvelope> = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(position, g)| envelope_of(g).map(|env| IndexedEnvelope { position, env }))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Positions of all geometries whose envelope meets `query`'s envelope,
    /// in ascending order.
    pub fn query(&self, query: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(env) = envelope_of(query) else {
            return Vec::new();
        };
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&env)
            .map(|e| e.position)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Number of indexed (non-empty) geometries.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_polygonal;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        parse_polygonal(&format!(
            "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
            x2 = x + size,
            y2 = y + size
        ))
        .unwrap()
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = SpatialIndex::build(std::iter::empty());
        assert!(index.is_empty());
        assert!(index.query(&square(0.0, 0.0, 1.0)).is_empty());
    }

    #[test]
    fn finds_overlapping_envelopes_only() {
        let refs = vec![square(0.0, 0.0, 10.0), square(100.0, 100.0, 10.0), square(5.0, 5.0, 10.0)];
        let index = SpatialIndex::build(&refs);
        assert_eq!(index.len(), 3);
        assert_eq!(index.query(&square(8.0, 8.0, 1.0)), vec![0, 2]);
        assert_eq!(index.query(&square(105.0, 105.0, 1.0)), vec![1]);
        assert!(index.query(&square(50.0, 50.0, 1.0)).is_empty());
    }

    #[test]
    fn envelope_hit_is_a_superset_of_true_intersection() {
        // An L-shaped reference whose envelope covers a square it does not touch.
        let l_shape = parse_polygonal(
            "POLYGON((0 0, 10 0, 10 2, 2 2, 2 10, 0 10, 0 0))",
        )
        .unwrap();
        let index = SpatialIndex::build(std::iter::once(&l_shape));
        assert_eq!(index.query(&square(6.0, 6.0, 2.0)), vec![0]);
    }

    #[test]
    fn touching_envelopes_are_candidates() {
        let refs = vec![square(0.0, 0.0, 1.0)];
        let index = SpatialIndex::build(&refs);
        assert_eq!(index.query(&square(1.0, 0.0, 1.0)), vec![0]);
    }

    #[test]
    fn empty_geometries_are_skipped_but_keep_positions() {
        let refs = vec![MultiPolygon::new(Vec::new()), square(0.0, 0.0, 1.0)];
        let index = SpatialIndex::build(&refs);
        assert_eq!(index.len(), 1);
        assert_eq!(index.query(&square(0.5, 0.5, 1.0)), vec![1]);
        assert!(index.query(&MultiPolygon::new(Vec::new())).is_empty());
    }
}
