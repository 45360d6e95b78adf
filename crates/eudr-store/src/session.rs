//! # Store Traits and Run Sessions
//!
//! The three persistence collaborators of a compliance run, and the
//! transactional session that bundles them.
//!
//! A run never talks to a shared connection. It calls
//! [`ComplianceStore::begin`] and receives its own [`RunSession`]; every
//! read and write of that run goes through the session, and the session
//! ends exactly once, in [`RunSession::commit`] or [`RunSession::rollback`].
//! A session dropped without either is rolled back by the backend.

use eudr_core::{
    ComplianceId, ComplianceRecord, CountryId, FunctionCodeSet, PartnerId, ReferenceGeometry,
    StagedRecord,
};

use crate::error::StoreError;

/// Compliance table access: staged ingestion, unprocessed reads, and the
/// processed-flag batch update.
pub trait SupplierComplianceStore {
    /// Rows of the upstream staging view for `partner`.
    async fn staged_records(&mut self, partner: PartnerId) -> Result<Vec<StagedRecord>, StoreError>;

    /// Insert staged rows as new unprocessed compliance records with both
    /// status flags set to compliant. Returns the number of rows inserted.
    async fn insert_compliance(&mut self, records: &[StagedRecord]) -> Result<u64, StoreError>;

    /// Distinct countries in which `partner` has unprocessed records,
    /// ascending.
    async fn unprocessed_countries(&mut self, partner: PartnerId) -> Result<Vec<CountryId>, StoreError>;

    /// Unprocessed records of `partner`, optionally restricted to one
    /// country, ordered by id.
    async fn unprocessed_records(
        &mut self,
        partner: PartnerId,
        country: Option<CountryId>,
    ) -> Result<Vec<ComplianceRecord>, StoreError>;

    /// Set the processed flag on those of `ids` that belong to `partner`
    /// and are still unprocessed. Returns the number of rows flipped.
    async fn mark_processed(&mut self, partner: PartnerId, ids: &[ComplianceId]) -> Result<u64, StoreError>;
}

/// Reference layer access.
pub trait LandUseReferenceStore {
    /// Polygons of `layer` whose spatial id starts with `prefix` and whose
    /// function code is in `codes`.
    async fn reference_geometries(
        &mut self,
        layer: &str,
        prefix: &str,
        codes: &FunctionCodeSet,
    ) -> Result<Vec<ReferenceGeometry>, StoreError>;
}

/// Partner catalog access.
pub trait PartnerCatalogStore {
    /// Display name of `partner`, if catalogued.
    async fn partner_name(&mut self, partner: PartnerId) -> Result<Option<String>, StoreError>;
}

/// One run's transactional view of all three collaborators.
pub trait RunSession: SupplierComplianceStore + LandUseReferenceStore + PartnerCatalogStore {
    /// Make every write of this session durable and visible.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every write of this session.
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Factory for run sessions.
pub trait ComplianceStore {
    /// Session type handed to each run.
    type Session: RunSession;

    /// Open a new session with its own transactional scope.
    async fn begin(&self) -> Result<Self::Session, StoreError>;
}
