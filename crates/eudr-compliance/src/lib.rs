//! # eudr-compliance — Partner Compliance Runs
//!
//! Ties the geometry engine, the stores, and the processed-flag tracker
//! into a per-partner evaluation:
//!
//! - [`run`]: [`ComplianceRun`], which evaluates one partner inside one
//!   store session and commits or rolls back as a unit.
//! - [`aggregator`]: the ComplianceAggregator, which turns intersection
//!   results into category counts and folds them into a summary.
//! - [`summary`]: [`ComplianceSummary`], the append-only nested output.
//! - [`config`]: [`RunConfig`] and the [`MatchCounting`] policy.
//!
//! ## Counting
//!
//! By default a category counts matches, not farms: one compliance polygon
//! overlapping two reference polygons of the same category adds two.
//! [`MatchCounting::PerPolygon`] counts each polygon once instead.

pub mod aggregator;
pub mod config;
pub mod run;
pub mod summary;

pub use aggregator::{CategoryCount, ComplianceAggregator};
pub use config::{MatchCounting, RunConfig};
pub use run::{ComplianceRun, CountryOutcome, RunError, RunReport};
pub use summary::{ComplianceSummary, CountrySummary, PartnerSummary};
