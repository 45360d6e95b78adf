//! WKT decoding and encoding.
//!
//! The reference store hands geometry over as WKT. Everything downstream
//! works on `MultiPolygon<f64>`: a single polygon becomes a one-member
//! multipolygon, geometry collections keep their polygonal members, and
//! non-areal geometry (points, lines) becomes an empty multipolygon, which
//! can never produce a positive overlap.

use std::str::FromStr;

use geo_types::{Geometry, MultiPolygon, Polygon};
use ::wkt::ToWkt;

use crate::error::{GeoError, Result};

/// Parse a WKT string into a geo-types geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    ::wkt::Wkt::from_str(wkt)
        .map_err(|e| GeoError::WktParse(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: ::wkt::conversion::Error| GeoError::WktParse(format!("{:?}", e)))
        })
}

/// Parse a WKT string and keep only its areal part.
pub fn parse_polygonal(wkt: &str) -> Result<MultiPolygon<f64>> {
    let geometry = parse_wkt(wkt)?;
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons);
    Ok(MultiPolygon::new(polygons))
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out);
            }
        }
        Geometry::Point(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiPoint(_)
        | Geometry::MultiLineString(_) => {}
    }
}

/// Encode a multipolygon as WKT.
pub fn to_wkt(geometry: &MultiPolygon<f64>) -> String {
    geometry.wkt_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn test_parse_polygon() {
        let geom = parse_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        assert!(matches!(geom, Geometry::Polygon(_)));
    }

    #[test]
    fn polygon_becomes_single_member_multipolygon() {
        let mp = parse_polygonal("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))").unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 100.0);
    }

    #[test]
    fn multipolygon_keeps_all_members() {
        let mp = parse_polygonal(
            "MULTIPOLYGON(((0 0, 1 0, 1 1, 0 1, 0 0)), ((5 5, 6 5, 6 6, 5 6, 5 5)))",
        )
        .unwrap();
        assert_eq!(mp.0.len(), 2);
    }

    #[test]
    fn collection_keeps_polygonal_members_only() {
        let mp = parse_polygonal(
            "GEOMETRYCOLLECTION(POINT(1 1), POLYGON((0 0, 2 0, 2 2, 0 2, 0 0)), LINESTRING(0 0, 5 5))",
        )
        .unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 4.0);
    }

    #[test]
    fn non_areal_geometry_is_empty() {
        assert!(parse_polygonal("POINT(3 4)").unwrap().0.is_empty());
        assert!(parse_polygonal("LINESTRING(0 0, 1 1)").unwrap().0.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_wkt("POLYGON((0 0, 1"), Err(GeoError::WktParse(_))));
        assert!(parse_polygonal("not wkt at all").is_err());
    }

    #[test]
    fn encoded_wkt_parses_back_to_same_area() {
        let mp = parse_polygonal("POLYGON((0 0, 4 0, 4 3, 0 3, 0 0))").unwrap();
        let text = to_wkt(&mp);
        assert!(text.starts_with("MULTIPOLYGON"));
        assert_eq!(parse_polygonal(&text).unwrap().unsigned_area(), 12.0);
    }
}
