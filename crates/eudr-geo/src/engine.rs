//! # Intersection Engine
//!
//! Computes per-pair overlap between compliance polygons and a reference
//! set. For each compliance record:
//!
//! 1. Skip it when it has no geometry (or its WKT does not decode).
//! 2. Validate the polygon.
//! 3. Query the reference set's [`SpatialIndex`] for candidates.
//! 4. Skip a candidate that is geometrically equal to the compliance
//!    polygon. Identical polygons come from duplicated source layers, not
//!    from a real overlap.
//! 5. Intersect; discard a zero-area intersection.
//! 6. Emit an [`IntersectionResult`] with hectare figures and the rounded
//!    overlap percentage.
//!
//! Reference rows are decoded and validated once, when the
//! [`ReferenceSet`] is prepared, and the index is built at the same time.
//! Every compliance polygon checked against that set reuses both.

use geo::{Area, BooleanOps, GeodesicArea, Relate};
use geo_types::MultiPolygon;
use serde::{Deserialize, Serialize, Serializer};

use eudr_core::{
    overlap_percent, to_hectares, ComplianceId, ComplianceRecord, ReferenceGeometry, SupplierId,
};

use crate::codec::{parse_polygonal, to_wkt};
use crate::index::SpatialIndex;
use crate::validate::validate;

/// How hectare figures are measured.
///
/// The overlap percentage is always the ratio of planar native-unit areas;
/// only the reported hectares depend on the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMode {
    /// Native planar units, assumed to be metres: area ÷ 10,000.
    #[default]
    Planar,
    /// Geodesic area on the WGS84 ellipsoid for lon/lat input, in m² ÷ 10,000.
    Geodesic,
}

/// A reference polygon after decoding and validation.
#[derive(Debug, Clone)]
pub struct PreparedReference {
    /// Country-scoped spatial identifier.
    pub spatial_id: String,
    /// Land-use function code.
    pub function_code: String,
    /// Validated geometry.
    pub geometry: MultiPolygon<f64>,
}

/// Decoded, validated reference polygons plus their spatial index.
#[derive(Debug)]
pub struct ReferenceSet {
    references: Vec<PreparedReference>,
    index: SpatialIndex,
}

impl ReferenceSet {
    /// Decode, validate, and index reference rows.
    ///
    /// Rows without geometry, or whose WKT does not decode, are left out.
    pub fn prepare(rows: &[ReferenceGeometry]) -> Self {
        let mut references = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(text) = row.geometry_wkt.as_deref() else {
                tracing::debug!(spatial_id = %row.spatial_id, "reference row has no geometry; skipped");
                continue;
            };
            match parse_polygonal(text) {
                Ok(geometry) => references.push(PreparedReference {
                    spatial_id: row.spatial_id.clone(),
                    function_code: row.function_code.clone(),
                    geometry: validate(geometry),
                }),
                Err(e) => {
                    tracing::warn!(spatial_id = %row.spatial_id, error = %e, "reference geometry did not decode; skipped");
                }
            }
        }
        let index = SpatialIndex::build(references.iter().map(|r| &r.geometry));
        Self { references, index }
    }

    /// Number of usable reference polygons.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Whether the set holds no usable reference polygon.
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Reference at `position`.
    pub fn get(&self, position: usize) -> Option<&PreparedReference> {
        self.references.get(position)
    }

    /// The envelope index over this set.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }
}

/// Overlap between one compliance polygon and one matched reference polygon.
#[derive(Debug, Clone, Serialize)]
pub struct IntersectionResult {
    /// Compliance record the polygon belongs to.
    pub compliance_id: ComplianceId,
    /// Supplier owning the farm.
    pub supplier_id: SupplierId,
    /// Spatial identifier of the matched reference polygon.
    pub reference_id: String,
    /// Function code of the matched reference polygon.
    pub function_code: String,
    /// The overlapping region.
    #[serde(rename = "intersection_wkt", serialize_with = "serialize_wkt")]
    pub intersection: MultiPolygon<f64>,
    /// Overlap area in hectares.
    pub intersection_area_ha: f64,
    /// Area of the (validated) compliance polygon in hectares.
    pub total_area_ha: f64,
    /// Overlap as a percentage of the compliance polygon, 4 decimals.
    pub intersection_percent: f64,
}

fn serialize_wkt<S: Serializer>(geometry: &MultiPolygon<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_wkt(geometry))
}

/// Pairwise intersection of compliance polygons against a reference set.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntersectionEngine {
    area_mode: AreaMode,
}

impl IntersectionEngine {
    /// Create an engine reporting hectares in `area_mode`.
    pub fn new(area_mode: AreaMode) -> Self {
        Self { area_mode }
    }

    /// The configured area mode.
    pub fn area_mode(&self) -> AreaMode {
        self.area_mode
    }

    /// Prepare `references` and intersect every record against them.
    pub fn intersect(
        &self,
        records: &[ComplianceRecord],
        references: &[ReferenceGeometry],
    ) -> Vec<IntersectionResult> {
        let set = ReferenceSet::prepare(references);
        self.intersect_prepared(records, &set)
    }

    /// Intersect every record against an already prepared reference set.
    pub fn intersect_prepared(
        &self,
        records: &[ComplianceRecord],
        references: &ReferenceSet,
    ) -> Vec<IntersectionResult> {
        let mut results = Vec::new();
        if references.is_empty() {
            return results;
        }
        for record in records {
            let Some(text) = record.geometry_wkt.as_deref() else {
                tracing::debug!(compliance_id = %record.id, "compliance record has no geometry; skipped");
                continue;
            };
            let polygon = match parse_polygonal(text) {
                Ok(p) => validate(p),
                Err(e) => {
                    tracing::warn!(compliance_id = %record.id, error = %e, "compliance geometry did not decode; skipped");
                    continue;
                }
            };
            self.intersect_polygon(record.id, record.supplier_id, &polygon, references, &mut results);
        }
        results
    }

    /// Intersect one validated compliance polygon against a reference set,
    /// appending results to `out`.
    pub fn intersect_polygon(
        &self,
        compliance_id: ComplianceId,
        supplier_id: SupplierId,
        polygon: &MultiPolygon<f64>,
        references: &ReferenceSet,
        out: &mut Vec<IntersectionResult>,
    ) {
        if polygon.0.is_empty() {
            return;
        }
        let total_native = polygon.unsigned_area();
        let total_area_ha = self.hectares(polygon, total_native);

        for position in references.index().query(polygon) {
            let Some(reference) = references.get(position) else {
                continue;
            };
            if reference.geometry.0.is_empty() {
                continue;
            }
            let matrix = polygon.relate(&reference.geometry);
            if polygon == &reference.geometry || matrix.is_equal_topo() {
                tracing::debug!(
                    compliance_id = %compliance_id,
                    reference_id = %reference.spatial_id,
                    "reference polygon identical to compliance polygon; skipped"
                );
                continue;
            }
            if !matrix.is_intersects() {
                continue;
            }

            // Containment is decided by the exact predicate; the overlay
            // snaps coordinates and may drift either way.
            let (intersection, overlap_native, intersection_area_ha) = if matrix.is_coveredby() {
                (polygon.clone(), total_native, total_area_ha)
            } else if matrix.is_covers() {
                let reference_native = reference.geometry.unsigned_area();
                let ha = self.hectares(&reference.geometry, reference_native);
                (reference.geometry.clone(), reference_native, ha)
            } else {
                let intersection = polygon.intersection(&reference.geometry);
                let overlap_native = intersection
                    .unsigned_area()
                    .min(total_native)
                    .min(reference.geometry.unsigned_area());
                let ha = self.hectares(&intersection, overlap_native).min(total_area_ha);
                (intersection, overlap_native, ha)
            };
            if overlap_native <= 0.0 {
                continue;
            }
            out.push(IntersectionResult {
                compliance_id,
                supplier_id,
                reference_id: reference.spatial_id.clone(),
                function_code: reference.function_code.clone(),
                intersection_area_ha,
                intersection,
                total_area_ha,
                intersection_percent: overlap_percent(overlap_native, total_native),
            });
        }
    }

    fn hectares(&self, geometry: &MultiPolygon<f64>, planar_native: f64) -> f64 {
        match self.area_mode {
            AreaMode::Planar => to_hectares(planar_native),
            AreaMode::Geodesic => to_hectares(geometry.geodesic_area_unsigned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use eudr_core::{CountryId, LandUseStatus, PartnerId, ProcessedFlag};
    use proptest::prelude::*;

    fn square_wkt(x: f64, y: f64, size: f64) -> String {
        format!(
            "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
            x2 = x + size,
            y2 = y + size
        )
    }

    fn record(id: i64, wkt: Option<String>) -> ComplianceRecord {
        ComplianceRecord {
            id: ComplianceId(id),
            supplier_id: SupplierId(100 + id),
            supplier_display_id: None,
            farm_number: None,
            commodity_id: None,
            revision: None,
            country_id: Some(CountryId(10)),
            province_id: None,
            district_id: None,
            geometry_wkt: wkt,
            partner_id: PartnerId(1),
            declared_area: None,
            deforestation_status: LandUseStatus::Compliant,
            land_use_status: LandUseStatus::Compliant,
            row_id: format!("row-{id}"),
            processed: ProcessedFlag::Unprocessed,
        }
    }

    fn reference(id: &str, wkt: Option<String>) -> ReferenceGeometry {
        ReferenceGeometry {
            spatial_id: id.to_string(),
            function_code: "1001".to_string(),
            geometry_wkt: wkt,
        }
    }

    #[test]
    fn polygon_inside_reference_is_full_overlap() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(100.0, 100.0, 100.0)))];
        let refs = vec![reference("010-a", Some(square_wkt(0.0, 0.0, 1000.0)))];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.compliance_id, ComplianceId(1));
        assert_eq!(r.supplier_id, SupplierId(101));
        assert_eq!(r.reference_id, "010-a");
        assert_relative_eq!(r.intersection_area_ha, 1.0);
        assert_relative_eq!(r.total_area_ha, 1.0);
        assert_eq!(r.intersection_area_ha, r.total_area_ha);
        assert_eq!(r.intersection_percent, 100.0);
    }

    #[test]
    fn partial_overlap_reports_percentage() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 100.0)))];
        let refs = vec![reference("r", Some(square_wkt(50.0, 0.0, 100.0)))];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        assert_relative_eq!(results[0].intersection_area_ha, 0.5);
        assert_relative_eq!(results[0].total_area_ha, 1.0);
        assert_eq!(results[0].intersection_percent, 50.0);
    }

    #[test]
    fn disjoint_polygon_yields_nothing() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 10.0)))];
        let refs = vec![reference("r", Some(square_wkt(500.0, 500.0, 10.0)))];
        assert!(engine.intersect(&records, &refs).is_empty());
    }

    #[test]
    fn touching_polygons_have_zero_area_and_are_discarded() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 10.0)))];
        let refs = vec![reference("r", Some(square_wkt(10.0, 0.0, 10.0)))];
        assert!(engine.intersect(&records, &refs).is_empty());
    }

    #[test]
    fn identical_polygons_are_not_a_match() {
        let engine = IntersectionEngine::default();
        let shape = square_wkt(0.0, 0.0, 10.0);
        let records = vec![record(1, Some(shape.clone()))];
        let refs = vec![reference("dup", Some(shape))];
        assert!(engine.intersect(&records, &refs).is_empty());
    }

    #[test]
    fn equal_polygons_with_different_vertex_order_are_not_a_match() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))".into()))];
        let refs = vec![reference("dup", Some("POLYGON((10 10, 0 10, 0 0, 10 0, 10 10))".into()))];
        assert!(engine.intersect(&records, &refs).is_empty());
    }

    #[test]
    fn two_disjoint_references_give_two_results() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 100.0)))];
        let refs = vec![
            reference("left", Some(square_wkt(-50.0, 0.0, 60.0))),
            reference("right", Some(square_wkt(90.0, 0.0, 60.0))),
        ];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 2);
        let ids: Vec<&str> = results.iter().map(|r| r.reference_id.as_str()).collect();
        assert_eq!(ids, vec!["left", "right"]);
    }

    #[test]
    fn records_without_geometry_are_skipped() {
        let engine = IntersectionEngine::default();
        let records = vec![
            record(1, None),
            record(2, Some("garbage".into())),
            record(3, Some(square_wkt(0.0, 0.0, 10.0))),
        ];
        let refs = vec![
            reference("none", None),
            reference("bad", Some("POLYGON((".into())),
            reference("ok", Some(square_wkt(5.0, 5.0, 10.0))),
        ];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].compliance_id, ComplianceId(3));
        assert_eq!(results[0].reference_id, "ok");
    }

    #[test]
    fn empty_reference_set_yields_nothing() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 10.0)))];
        assert!(engine.intersect(&records, &[]).is_empty());
    }

    #[test]
    fn self_intersecting_compliance_polygon_is_repaired_before_use() {
        let engine = IntersectionEngine::default();
        // Bowtie made of two 200 x 100 triangles, each 10,000 native units.
        let records = vec![record(1, Some("POLYGON((0 0, 200 200, 200 0, 0 200, 0 0))".into()))];
        let refs = vec![reference("r", Some(square_wkt(-10.0, -10.0, 500.0)))];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        assert_relative_eq!(results[0].total_area_ha, 2.0, epsilon = 1e-9);
        assert_relative_eq!(results[0].intersection_area_ha, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn geodesic_mode_changes_hectares_not_percent() {
        let planar = IntersectionEngine::new(AreaMode::Planar);
        let geodesic = IntersectionEngine::new(AreaMode::Geodesic);
        let records = vec![record(1, Some(square_wkt(100.0, 0.0, 0.01)))];
        let refs = vec![reference("r", Some(square_wkt(100.005, 0.0, 0.01)))];

        let p = planar.intersect(&records, &refs);
        let g = geodesic.intersect(&records, &refs);
        assert_eq!(p.len(), 1);
        assert_eq!(g.len(), 1);
        assert_eq!(p[0].intersection_percent, g[0].intersection_percent);
        // A 0.01° square near the equator is roughly 1.1 km on a side.
        assert!(g[0].total_area_ha > 10_000.0 * p[0].total_area_ha);
    }

    #[test]
    fn contained_polygon_with_awkward_coordinates_reports_exact_full_overlap() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(45.72, 45.72, 11.68)))];
        let refs = vec![reference("r", Some(square_wkt(10.43, 10.43, 47.19)))];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].intersection_area_ha, results[0].total_area_ha);
        assert_eq!(results[0].intersection_percent, 100.0);
    }

    #[test]
    fn reference_inside_polygon_contributes_its_own_area() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 100.0)))];
        let refs = vec![reference("r", Some(square_wkt(12.34, 56.78, 9.87)))];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        assert!(results[0].intersection_area_ha <= 9.87 * 9.87 / 10_000.0 * (1.0 + 1e-12));
        assert_relative_eq!(results[0].intersection_area_ha, 9.87 * 9.87 / 10_000.0, epsilon = 1e-12);
    }

    #[test]
    fn overlapping_members_still_match_inside_the_shared_region() {
        let engine = IntersectionEngine::default();
        let farm = "MULTIPOLYGON(((0 0, 100 0, 100 100, 0 100, 0 0)), ((50 0, 150 0, 150 100, 50 100, 50 0)))";
        let records = vec![record(1, Some(farm.to_string()))];
        let refs = vec![reference("r", Some("POLYGON((60 10, 90 10, 90 90, 60 90, 60 10))".to_string()))];
        let results = engine.intersect(&records, &refs);
        assert_eq!(results.len(), 1);
        assert_relative_eq!(results[0].total_area_ha, 1.5, epsilon = 1e-9);
        assert_relative_eq!(results[0].intersection_area_ha, 0.24, epsilon = 1e-9);
    }

    #[test]
    fn result_serializes_geometry_as_wkt() {
        let engine = IntersectionEngine::default();
        let records = vec![record(1, Some(square_wkt(0.0, 0.0, 10.0)))];
        let refs = vec![reference("r", Some(square_wkt(5.0, 0.0, 10.0)))];
        let results = engine.intersect(&records, &refs);
        let json = serde_json::to_value(&results[0]).unwrap();
        assert!(json["intersection_wkt"].as_str().unwrap().starts_with("MULTIPOLYGON"));
        assert_eq!(json["compliance_id"], 1);
        assert_eq!(json["intersection_percent"], 50.0);
    }

    proptest! {
        #[test]
        fn overlap_never_exceeds_either_area(
            ax in 0.0f64..100.0, ay in 0.0f64..100.0, asz in 1.0f64..50.0,
            bx in 0.0f64..100.0, by in 0.0f64..100.0, bsz in 1.0f64..50.0,
        ) {
            let engine = IntersectionEngine::default();
            let records = vec![record(1, Some(square_wkt(ax, ay, asz)))];
            let refs = vec![reference("r", Some(square_wkt(bx, by, bsz)))];
            for r in engine.intersect(&records, &refs) {
                let a_ha = asz * asz / 10_000.0;
                let b_ha = bsz * bsz / 10_000.0;
                prop_assert!(r.intersection_area_ha <= a_ha.min(b_ha) * (1.0 + 1e-9));
                prop_assert!(r.intersection_percent >= 0.0);
                prop_assert!(r.intersection_percent <= 100.01);
            }
        }
    }
}
