//! # eudr-core — Foundational Types for the EUDR Land-Use Stack
//!
//! This crate is the leaf of the workspace DAG. It defines the identifier
//! newtypes, the record types exchanged with the persistence collaborators,
//! the static land-use configuration tables, and the hectare/percentage
//! arithmetic shared by the geometry engine and the aggregator.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `PartnerId`, `CountryId`,
//!    `ComplianceId`, `SupplierId` — a country id cannot be passed where a
//!    partner id is expected.
//!
//! 2. **Geometry travels as WKT.** Records carry their polygon as
//!    well-known text, exactly as the reference store hands it over. Parsing
//!    into an in-memory geometry happens in `eudr-geo`, before any
//!    validation or intersection step.
//!
//! 3. **Unconfigured countries are not errors.** [`LandUseTables::entries`]
//!    returns an empty slice for a country without land-use entries.
//!
//! 4. **One place for unit conversion.** Every hectare figure flows through
//!    [`area::to_hectares`]; every overlap percentage through
//!    [`area::overlap_percent`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `eudr-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod area;
pub mod error;
pub mod identity;
pub mod landuse;
pub mod record;

// Re-export primary types for ergonomic imports.
pub use area::{overlap_percent, to_hectares, HECTARE_SQUARE_UNITS, PERCENT_DECIMALS};
pub use error::{ConfigError, EudrError};
pub use identity::{ComplianceId, CountryId, PartnerId, RunId, SupplierId};
pub use landuse::{category_key, FunctionCodeSet, LandUseConfigEntry, LandUseTables};
pub use record::{ComplianceRecord, LandUseStatus, ProcessedFlag, ReferenceGeometry, StagedRecord};
