//! # Partner Compliance Run
//!
//! Evaluates every unprocessed compliance record of one partner inside a
//! single store session:
//!
//! ```text
//! begin ──▶ ingest staged rows ──▶ partner name ──▶ for each country:
//!              unprocessed records ──▶ for each land-use entry:
//!                  reference set (cached per code set) ──▶ intersect ──▶ count
//!        ──▶ commit processed flags ──▶ fold counts into the summary
//! ```
//!
//! The caller's [`ComplianceSummary`] is touched only after the flag
//! commit succeeds. A failed run rolls its session back and leaves both
//! the store and the summary as they were.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use eudr_core::{CountryId, EudrError, FunctionCodeSet, LandUseTables, PartnerId, RunId};
use eudr_geo::{IntersectionEngine, ReferenceSet};
use eudr_state::{CommitReport, ProcessingTracker, TrackerError};
use eudr_store::{ComplianceStore, RunSession, StoreError};

use crate::aggregator::{CategoryCount, ComplianceAggregator};
use crate::config::RunConfig;
use crate::summary::ComplianceSummary;

/// Errors that abort a compliance run.
#[derive(Error, Debug)]
pub enum RunError {
    /// A store read or write failed before the flag commit.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The processed-flag commit failed or a record was rejected.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl From<RunError> for EudrError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Store(e) => e.into(),
            RunError::Tracker(TrackerError::Flag(e)) => EudrError::InvalidTransition(e.to_string()),
            RunError::Tracker(TrackerError::Store(e)) => e.into(),
            RunError::Tracker(e) => EudrError::InvalidTransition(e.to_string()),
        }
    }
}

/// Counts computed for one country.
#[derive(Debug, Clone, Serialize)]
pub struct CountryOutcome {
    /// Country evaluated.
    pub country_id: CountryId,
    /// Configured country code, if any.
    pub country_code: Option<String>,
    /// Unprocessed records evaluated.
    pub records: usize,
    /// One count per configured land-use entry, in configuration order.
    pub counts: Vec<CategoryCount>,
}

/// Outcome of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Partner evaluated.
    pub partner_id: PartnerId,
    /// Staged rows ingested.
    pub ingested: u64,
    /// Partner display name (empty when not catalogued).
    pub partner_name: String,
    /// Per-country counts.
    pub countries: Vec<CountryOutcome>,
    /// Processed-flag commit.
    pub commit: CommitReport,
}

struct Evaluation {
    ingested: u64,
    partner_name: String,
    countries: Vec<CountryOutcome>,
}

/// Runs partner evaluations against a store.
#[derive(Debug, Clone)]
pub struct ComplianceRun<'a> {
    tables: &'a LandUseTables,
    config: RunConfig,
    engine: IntersectionEngine,
    aggregator: ComplianceAggregator,
}

impl<'a> ComplianceRun<'a> {
    /// Create a runner over `tables` with `config`.
    pub fn new(tables: &'a LandUseTables, config: RunConfig) -> Self {
        Self {
            tables,
            config,
            engine: IntersectionEngine::new(config.area_mode),
            aggregator: ComplianceAggregator::new(config.counting),
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Evaluate `partner` in a fresh session of `store` and append the
    /// outcome to `summary`.
    pub async fn run_partner<C: ComplianceStore>(
        &self,
        store: &C,
        partner: PartnerId,
        summary: &mut ComplianceSummary,
    ) -> Result<RunReport, RunError> {
        let run_id = RunId::new();
        tracing::info!(partner_id = %partner, run_id = %run_id, "compliance run started");

        let mut session = store.begin().await?;
        let mut tracker = ProcessingTracker::new(partner, run_id);

        let evaluation = match self.evaluate(&mut session, &mut tracker, partner).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                tracker.abort(session, &err).await;
                return Err(err);
            }
        };

        let commit = tracker.commit(session).await?;

        summary.annotate_partner(partner, evaluation.ingested, &evaluation.partner_name);
        for outcome in &evaluation.countries {
            self.aggregator.aggregate(
                summary,
                partner,
                outcome.country_id,
                outcome.country_code.as_deref(),
                &outcome.counts,
            );
        }

        tracing::info!(
            partner_id = %partner,
            run_id = %run_id,
            ingested = evaluation.ingested,
            countries = evaluation.countries.len(),
            flipped = commit.flipped,
            "compliance run committed"
        );
        Ok(RunReport {
            run_id,
            partner_id: partner,
            ingested: evaluation.ingested,
            partner_name: evaluation.partner_name,
            countries: evaluation.countries,
            commit,
        })
    }

    async fn evaluate<S: RunSession>(
        &self,
        session: &mut S,
        tracker: &mut ProcessingTracker,
        partner: PartnerId,
    ) -> Result<Evaluation, RunError> {
        let ingested = if self.config.ingest_staged {
            let staged = session.staged_records(partner).await?;
            if staged.is_empty() {
                0
            } else {
                session.insert_compliance(&staged).await?
            }
        } else {
            0
        };

        let partner_name = session.partner_name(partner).await?.unwrap_or_default();
        let country_ids = session.unprocessed_countries(partner).await?;
        tracing::debug!(partner_id = %partner, ingested, countries = country_ids.len(), "partner loaded");

        let mut references: HashMap<(CountryId, FunctionCodeSet), ReferenceSet> = HashMap::new();
        let mut countries = Vec::with_capacity(country_ids.len());

        for country in country_ids {
            // Country-scoped references are only matched against farms of
            // the same country.
            let records = session.unprocessed_records(partner, Some(country)).await?;
            tracker.visit_all(&records)?;

            let entries = self.tables.entries(country);
            if entries.is_empty() {
                tracing::warn!(partner_id = %partner, country_id = %country, "no land-use entries configured for country");
            }

            let mut counts = Vec::with_capacity(entries.len());
            for entry in entries {
                let key = (country, entry.function_codes.clone());
                if !references.contains_key(&key) {
                    let rows = session
                        .reference_geometries(
                            &self.tables.reference_layer,
                            &country.reference_prefix(),
                            &entry.function_codes,
                        )
                        .await?;
                    let set = ReferenceSet::prepare(&rows);
                    tracing::debug!(
                        country_id = %country,
                        codes = %entry.function_codes,
                        rows = rows.len(),
                        usable = set.len(),
                        "reference set prepared"
                    );
                    references.insert(key.clone(), set);
                }
                let count = match references.get(&key) {
                    Some(set) => self.aggregator.count(&self.engine.intersect_prepared(&records, set)),
                    None => 0,
                };
                tracing::debug!(country_id = %country, category = %entry.key(), count, "category evaluated");
                counts.push(CategoryCount { key: entry.key(), count });
            }

            countries.push(CountryOutcome {
                country_id: country,
                country_code: self.tables.country_code(country).map(str::to_string),
                records: records.len(),
                counts,
            });
        }

        // Rows without a country are never evaluated but still count as
        // consumed by this run.
        let remaining = session.unprocessed_records(partner, None).await?;
        let uncountried = tracker.visit_all(&remaining)?;
        if uncountried > 0 {
            tracing::warn!(partner_id = %partner, records = uncountried, "records without a country flagged without evaluation");
        }

        Ok(Evaluation {
            ingested,
            partner_name,
            countries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eudr_core::{ComplianceId, ComplianceRecord, ReferenceGeometry, StagedRecord, SupplierId};
    use eudr_store::{FailurePoint, MemoryStore};

    const LAYER: &str = eudr_core::landuse::DEFAULT_REFERENCE_LAYER;

    fn square(x: f64, y: f64, size: f64) -> String {
        format!(
            "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
            x2 = x + size,
            y2 = y + size
        )
    }

    fn staged(partner: i64, country: i32, wkt: Option<String>, row: &str) -> StagedRecord {
        StagedRecord {
            country_id: Some(CountryId(country)),
            ..uncountried(partner, wkt, row)
        }
    }

    fn uncountried(partner: i64, wkt: Option<String>, row: &str) -> StagedRecord {
        StagedRecord {
            supplier_id: SupplierId(500),
            supplier_display_id: None,
            farm_number: None,
            commodity_id: None,
            revision: None,
            country_id: None,
            province_id: None,
            district_id: None,
            geometry_wkt: wkt,
            partner_id: PartnerId(partner),
            declared_area: None,
            row_id: row.to_string(),
        }
    }

    fn reference(id: &str, code: &str, wkt: String) -> ReferenceGeometry {
        ReferenceGeometry {
            spatial_id: id.to_string(),
            function_code: code.to_string(),
            geometry_wkt: Some(wkt),
        }
    }

    fn indonesia_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.set_partner_name(PartnerId(1), "Acme Palm");
        store.add_staged(staged(1, 10, Some(square(10.0, 10.0, 10.0)), "a"));
        store.add_reference(LAYER, reference("010-p", "1001", square(0.0, 0.0, 100.0)));
        store.add_reference(LAYER, reference("010-c", "1004", square(500.0, 500.0, 10.0)));
        store
    }

    #[tokio::test]
    async fn run_ingests_evaluates_and_commits() {
        let store = indonesia_store();
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        let report = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();
        assert_eq!(report.ingested, 1);
        assert_eq!(report.partner_name, "Acme Palm");
        assert_eq!(report.commit.flipped, 1);
        assert_eq!(store.unprocessed_count(PartnerId(1)), 0);

        let partner = summary.partner(PartnerId(1)).unwrap();
        assert_eq!(partner.data_redshift, vec![1]);
        assert_eq!(partner.partner_name, vec!["Acme Palm"]);
        let country = summary.country(PartnerId(1), CountryId(10)).unwrap();
        assert_eq!(country.country, vec!["ind"]);
        assert_eq!(country.counts("protected_forest"), Some(&[1][..]));
        assert_eq!(country.counts("fixed_production_forest"), Some(&[0][..]));
        assert_eq!(country.counts("limited_production_forest"), Some(&[0][..]));
    }

    #[tokio::test]
    async fn second_run_appends_to_the_same_summary() {
        let store = indonesia_store();
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();
        runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();

        let country = summary.country(PartnerId(1), CountryId(10)).unwrap();
        assert_eq!(country.country, vec!["ind"]);
        assert_eq!(country.counts("protected_forest"), Some(&[1, 1][..]));
        assert_eq!(summary.partner(PartnerId(1)).unwrap().data_redshift, vec![1, 1]);
    }

    #[tokio::test]
    async fn records_without_geometry_are_still_flipped() {
        let store = MemoryStore::new();
        store.add_staged(staged(1, 10, None, "blank"));
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        let report = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();
        assert_eq!(report.commit.flipped, 1);
        assert_eq!(summary.partner(PartnerId(1)).unwrap().partner_name, vec![""]);
    }

    #[tokio::test]
    async fn records_without_country_are_flipped_but_not_counted() {
        let store = indonesia_store();
        store.add_staged(uncountried(1, Some(square(10.0, 10.0, 10.0)), "no-country"));
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        let report = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();
        assert_eq!(report.ingested, 2);
        assert_eq!(report.commit.flipped, 2);
        assert_eq!(report.countries.len(), 1);
        assert_eq!(store.unprocessed_count(PartnerId(1)), 0);

        let partner = summary.partner(PartnerId(1)).unwrap();
        assert_eq!(partner.countries.len(), 1);
        assert_eq!(
            summary.country(PartnerId(1), CountryId(10)).unwrap().counts("protected_forest"),
            Some(&[1][..])
        );
    }

    #[tokio::test]
    async fn unconfigured_country_gets_an_empty_breakdown() {
        let store = MemoryStore::new();
        store.add_staged(staged(1, 99, Some(square(0.0, 0.0, 1.0)), "x"));
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();
        let country = summary.country(PartnerId(1), CountryId(99)).unwrap();
        assert!(country.country.is_empty());
        assert!(country.categories.is_empty());
        assert_eq!(store.unprocessed_count(PartnerId(1)), 0);
    }

    #[tokio::test]
    async fn reference_failure_rolls_back_and_leaves_summary_alone() {
        let store = indonesia_store();
        store.inject_failure(FailurePoint::ReferenceFetch, StoreError::Connectivity("reset".into()));
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        let err = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap_err();
        assert!(matches!(err, RunError::Store(StoreError::Connectivity(_))));
        assert!(summary.is_empty());
        assert!(store.compliance_records().is_empty());
        assert_eq!(store.stats().rolled_back, 1);
    }

    #[tokio::test]
    async fn failed_ingest_aborts_the_run() {
        let store = indonesia_store();
        store.inject_failure(
            FailurePoint::InsertCompliance,
            StoreError::ConstraintViolation("duplicate row_id".into()),
        );
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        let err = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap_err();
        assert!(matches!(err, RunError::Store(StoreError::ConstraintViolation(_))));
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn ingest_can_be_disabled() {
        let store = indonesia_store();
        store.add_compliance(ComplianceRecord::from_staged(
            ComplianceId(40),
            staged(1, 10, Some(square(20.0, 20.0, 5.0)), "existing"),
        ));
        let tables = LandUseTables::default();
        let config = RunConfig {
            ingest_staged: false,
            ..RunConfig::default()
        };
        let runner = ComplianceRun::new(&tables, config);
        let mut summary = ComplianceSummary::new();

        let report = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap();
        assert_eq!(report.ingested, 0);
        assert_eq!(report.commit.flipped, 1);
        assert_eq!(store.compliance_records().len(), 1);
    }

    #[tokio::test]
    async fn commit_failure_surfaces_as_tracker_error() {
        let store = indonesia_store();
        store.inject_failure(FailurePoint::Commit, StoreError::Backend("serialization failure".into()));
        let tables = LandUseTables::default();
        let runner = ComplianceRun::new(&tables, RunConfig::default());
        let mut summary = ComplianceSummary::new();

        let err = runner.run_partner(&store, PartnerId(1), &mut summary).await.unwrap_err();
        assert!(matches!(err, RunError::Tracker(TrackerError::Store(StoreError::Backend(_)))));
        assert!(summary.is_empty());
        assert!(store.compliance_records().is_empty());

        let top: EudrError = err.into();
        assert!(matches!(top, EudrError::Persistence(_)));
    }
}
