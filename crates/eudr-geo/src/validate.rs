//! # Geometry Validation and Repair
//!
//! `validate(g)` returns `g` untouched when it is already valid, and a
//! deterministic repair otherwise. A geometry is valid when it passes
//! OGC-style topological validation and its rings are in the default
//! orientation (exteriors counter-clockwise, interiors clockwise).
//!
//! Repair, in order:
//!
//! 1. Drop rings with non-finite coordinates or fewer than four positions.
//!    A polygon whose exterior is dropped is dropped entirely.
//! 2. If the remainder is topologically valid, only re-orient its rings.
//! 3. Otherwise rebuild the remainder member by member. A self-intersecting
//!    member is overlaid with the empty multipolygon, which splits it at its
//!    crossing points, and the members are then unioned together so that
//!    overlapping members keep their combined extent.
//! 4. Re-orient. If the result still fails validation it is replaced by the
//!    empty multipolygon.
//!
//! Step 4 is what makes the operation idempotent: every output of
//! `validate` is valid, and valid input is returned unchanged.

use geo::orient::Direction;
use geo::{BooleanOps, Orient, Validation, Winding};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};

/// Whether `geometry` is topologically valid and correctly oriented.
///
/// The empty multipolygon is valid.
pub fn is_valid(geometry: &MultiPolygon<f64>) -> bool {
    geometry.is_valid() && is_default_oriented(geometry)
}

/// Validate `geometry`, repairing it when necessary. Never fails.
pub fn validate(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    if is_valid(&geometry) {
        return geometry;
    }
    repair(&geometry)
}

fn repair(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let cleaned = strip_degenerate(geometry);
    let rebuilt = if cleaned.is_valid() {
        cleaned
    } else {
        dissolve(cleaned)
    };
    let oriented = rebuilt.orient(Direction::Default);
    if is_valid(&oriented) {
        oriented
    } else {
        tracing::debug!(
            polygons = geometry.0.len(),
            "geometry could not be repaired; treating as empty"
        );
        MultiPolygon::new(Vec::new())
    }
}

/// Union the members one at a time. Overlay of the whole multipolygon at
/// once fills by parity, which would punch holes where members overlap.
fn dissolve(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry
        .0
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
            let mut part = MultiPolygon::new(vec![polygon]);
            if !part.is_valid() {
                part = part.union(&MultiPolygon::new(Vec::new()));
            }
            acc.union(&part)
        })
}

fn is_default_oriented(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.iter().all(|polygon| {
        polygon.exterior().is_ccw() && polygon.interiors().iter().all(|ring| ring.is_cw())
    })
}

fn strip_degenerate(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let polygons = geometry
        .0
        .iter()
        .filter(|p| usable_ring(p.exterior()))
        .map(|p| {
            let interiors = p
                .interiors()
                .iter()
                .filter(|ring| usable_ring(ring))
                .cloned()
                .collect();
            Polygon::new(p.exterior().clone(), interiors)
        })
        .collect();
    MultiPolygon::new(polygons)
}

fn usable_ring(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4 && ring.0.iter().all(finite)
}

fn finite(c: &Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}
