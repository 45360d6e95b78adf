//! Error types for the geometry engine.

use thiserror::Error;

/// Geometry engine errors.
///
/// Only decoding can fail. Invalid polygons are repaired and missing
/// polygons are skipped, so neither appears here.
#[derive(Error, Debug)]
pub enum GeoError {
    /// WKT parsing error.
    #[error("WKT parse error: {0}")]
    WktParse(String),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeoError>;
