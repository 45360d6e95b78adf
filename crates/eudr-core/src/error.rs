//! # Error Types — Structured Error Hierarchy
//!
//! Top-level error type for the EUDR stack plus the configuration error
//! raised while loading land-use tables. Geometry, persistence, and
//! run-level errors live in their own crates and convert into
//! [`EudrError`] where a caller needs a single type.
//!
//! Geometry problems (missing or invalid polygons) are deliberately absent:
//! missing geometry is excluded silently and invalid geometry is repaired,
//! so neither ever surfaces as an error.

use thiserror::Error;

/// Top-level error type for the EUDR stack.
#[derive(Error, Debug)]
pub enum EudrError {
    /// Land-use configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A record was rejected by a state transition.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// The persistence collaborator failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised while loading or validating [`LandUseTables`](crate::LandUseTables).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("failed to parse land-use tables: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The tables file could not be read.
    #[error("failed to read land-use tables from {path}: {source}")]
    Read {
        /// Path that was being read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A land-use entry has no display name.
    #[error("country {country}: land-use entry #{index} has an empty display name")]
    EmptyDisplayName {
        /// Country the entry belongs to.
        country: i32,
        /// Position of the entry in the country's list.
        index: usize,
    },

    /// A land-use entry has no function codes.
    #[error("country {country}: land-use entry '{display_name}' has no function codes")]
    EmptyFunctionCodes {
        /// Country the entry belongs to.
        country: i32,
        /// Display name of the offending entry.
        display_name: String,
    },

    /// A display name maps to the key holding the country-code list.
    #[error("country {country}: land-use entry '{display_name}' maps to the reserved key 'country'")]
    ReservedCategoryKey {
        /// Country the entry belongs to.
        country: i32,
        /// Display name of the offending entry.
        display_name: String,
    },

    /// Country ids must be positive.
    #[error("invalid country id {0}")]
    InvalidCountry(i32),

    /// The reference layer name is empty.
    #[error("reference layer name must not be empty")]
    EmptyReferenceLayer,
}
