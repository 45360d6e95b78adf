//! # eudr-geo — Spatial Intersection Engine
//!
//! Turns WKT farm boundaries and reference land-cover polygons into
//! per-pair overlap figures:
//!
//! ```text
//! WKT ──parse──▶ MultiPolygon ──validate──▶ valid MultiPolygon
//!                                              │
//!                reference set ──▶ SpatialIndex (R-tree over envelopes)
//!                                              │ candidates
//!                                              ▼
//!                         IntersectionEngine: equality skip → intersection
//!                                             → zero-area skip → result
//! ```
//!
//! - [`codec`]: WKT decoding into polygonal geometry, and encoding back.
//! - [`validate`]: the GeometryValidator — idempotent repair of invalid
//!   polygons.
//! - [`index`]: the SpatialIndex — bulk-loaded R-tree returning a superset
//!   of true intersectors for a query polygon.
//! - [`engine`]: the IntersectionEngine and [`IntersectionResult`].
//!
//! Results are reported per matched reference polygon. A farm overlapping
//! two disjoint reference polygons yields two results.

pub mod codec;
pub mod engine;
pub mod error;
pub mod index;
pub mod validate;

pub use engine::{AreaMode, IntersectionEngine, IntersectionResult, PreparedReference, ReferenceSet};
pub use error::{GeoError, Result};
pub use index::SpatialIndex;
pub use validate::{is_valid, validate};
pub use codec::{parse_polygonal, parse_wkt, to_wkt};
