//! # In-Memory Backend
//!
//! Tables held behind a `parking_lot::RwLock`. A session takes a snapshot
//! of the committed tables at `begin`, reads and writes only its snapshot,
//! and publishes its change log (inserted records, flipped flags) under a
//! single write lock at `commit`. Rolling back, or dropping the session,
//! discards the change log.
//!
//! Flag flips are checked against the committed tables as well as the
//! snapshot, the way a row-locking `UPDATE ... WHERE is_processed = 0`
//! behaves: a record another session already committed as processed is not
//! counted again.
//!
//! Failures can be injected per [`FailurePoint`]; each injected error fires
//! once.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use eudr_core::{
    ComplianceId, ComplianceRecord, CountryId, FunctionCodeSet, PartnerId, ProcessedFlag,
    ReferenceGeometry, StagedRecord,
};

use crate::error::StoreError;
use crate::session::{
    ComplianceStore, LandUseReferenceStore, PartnerCatalogStore, RunSession,
    SupplierComplianceStore,
};

/// Operation at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// [`ComplianceStore::begin`].
    Begin,
    /// [`SupplierComplianceStore::staged_records`].
    StagedRead,
    /// [`SupplierComplianceStore::insert_compliance`].
    InsertCompliance,
    /// [`SupplierComplianceStore::unprocessed_records`].
    UnprocessedRead,
    /// [`LandUseReferenceStore::reference_geometries`].
    ReferenceFetch,
    /// [`PartnerCatalogStore::partner_name`].
    CatalogRead,
    /// [`SupplierComplianceStore::mark_processed`].
    MarkProcessed,
    /// [`RunSession::commit`].
    Commit,
}

/// Session lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Sessions opened.
    pub begun: u64,
    /// Sessions committed.
    pub committed: u64,
    /// Sessions rolled back, explicitly or by drop.
    pub rolled_back: u64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    staged: Vec<StagedRecord>,
    compliance: BTreeMap<ComplianceId, ComplianceRecord>,
    references: BTreeMap<String, Vec<ReferenceGeometry>>,
    catalog: BTreeMap<PartnerId, String>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    failures: Mutex<HashMap<FailurePoint, StoreError>>,
    stats: Mutex<SessionStats>,
}

impl Shared {
    fn take_failure(&self, point: FailurePoint) -> Result<(), StoreError> {
        match self.failures.lock().remove(&point) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory compliance store.
///
/// Cloning yields another handle to the same tables.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store. Compliance ids start at 1.
    pub fn new() -> Self {
        let shared = Shared::default();
        shared.tables.write().next_id = 1;
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Add a row to the staging view.
    pub fn add_staged(&self, record: StagedRecord) {
        self.shared.tables.write().staged.push(record);
    }

    /// Add a committed compliance record, keeping its id.
    pub fn add_compliance(&self, record: ComplianceRecord) {
        let mut tables = self.shared.tables.write();
        tables.next_id = tables.next_id.max(record.id.0 + 1);
        tables.compliance.insert(record.id, record);
    }

    /// Add a polygon to reference layer `layer`.
    pub fn add_reference(&self, layer: &str, reference: ReferenceGeometry) {
        self.shared
            .tables
            .write()
            .references
            .entry(layer.to_string())
            .or_default()
            .push(reference);
    }

    /// Catalogue `partner` under `name`.
    pub fn set_partner_name(&self, partner: PartnerId, name: impl Into<String>) {
        self.shared.tables.write().catalog.insert(partner, name.into());
    }

    /// Make the next call at `point` fail with `error`.
    pub fn inject_failure(&self, point: FailurePoint, error: StoreError) {
        self.shared.failures.lock().insert(point, error);
    }

    /// Committed compliance record `id`.
    pub fn record(&self, id: ComplianceId) -> Option<ComplianceRecord> {
        self.shared.tables.read().compliance.get(&id).cloned()
    }

    /// All committed compliance records, ordered by id.
    pub fn compliance_records(&self) -> Vec<ComplianceRecord> {
        self.shared.tables.read().compliance.values().cloned().collect()
    }

    /// Number of committed unprocessed records of `partner`.
    pub fn unprocessed_count(&self, partner: PartnerId) -> usize {
        self.shared
            .tables
            .read()
            .compliance
            .values()
            .filter(|r| r.partner_id == partner && r.is_unprocessed())
            .count()
    }

    /// Session lifecycle counters.
    pub fn stats(&self) -> SessionStats {
        *self.shared.stats.lock()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceStore for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> Result<MemorySession, StoreError> {
        self.shared.take_failure(FailurePoint::Begin)?;
        let snapshot = self.shared.tables.read().clone();
        self.shared.stats.lock().begun += 1;
        Ok(MemorySession {
            shared: Arc::clone(&self.shared),
            snapshot,
            inserted: Vec::new(),
            flipped: BTreeSet::new(),
            finished: false,
        })
    }
}

/// A run's session over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Shared>,
    snapshot: Tables,
    inserted: Vec<ComplianceId>,
    flipped: BTreeSet<ComplianceId>,
    finished: bool,
}

impl MemorySession {
    fn finish_rolled_back(&mut self) {
        self.finished = true;
        self.shared.stats.lock().rolled_back += 1;
        tracing::debug!(
            inserted = self.inserted.len(),
            flipped = self.flipped.len(),
            "memory session rolled back"
        );
    }

    fn committed_unprocessed(&self, id: ComplianceId) -> bool {
        match self.shared.tables.read().compliance.get(&id) {
            Some(record) => record.is_unprocessed(),
            None => true,
        }
    }
}

impl SupplierComplianceStore for MemorySession {
    async fn staged_records(&mut self, partner: PartnerId) -> Result<Vec<StagedRecord>, StoreError> {
        self.shared.take_failure(FailurePoint::StagedRead)?;
        Ok(self
            .snapshot
            .staged
            .iter()
            .filter(|r| r.partner_id == partner)
            .cloned()
            .collect())
    }

    async fn insert_compliance(&mut self, records: &[StagedRecord]) -> Result<u64, StoreError> {
        self.shared.take_failure(FailurePoint::InsertCompliance)?;
        let first = {
            let mut tables = self.shared.tables.write();
            let first = tables.next_id;
            tables.next_id += records.len() as i64;
            first
        };
        for (offset, staged) in records.iter().enumerate() {
            let id = ComplianceId(first + offset as i64);
            self.snapshot
                .compliance
                .insert(id, ComplianceRecord::from_staged(id, staged.clone()));
            self.inserted.push(id);
        }
        Ok(records.len() as u64)
    }

    async fn unprocessed_countries(&mut self, partner: PartnerId) -> Result<Vec<CountryId>, StoreError> {
        self.shared.take_failure(FailurePoint::UnprocessedRead)?;
        let countries: BTreeSet<CountryId> = self
            .snapshot
            .compliance
            .values()
            .filter(|r| r.partner_id == partner && r.is_unprocessed())
            .filter_map(|r| r.country_id)
            .collect();
        Ok(countries.into_iter().collect())
    }

    async fn unprocessed_records(
        &mut self,
        partner: PartnerId,
        country: Option<CountryId>,
    ) -> Result<Vec<ComplianceRecord>, StoreError> {
        self.shared.take_failure(FailurePoint::UnprocessedRead)?;
        Ok(self
            .snapshot
            .compliance
            .values()
            .filter(|r| r.partner_id == partner && r.is_unprocessed())
            .filter(|r| country.map_or(true, |c| r.country_id == Some(c)))
            .cloned()
            .collect())
    }

    async fn mark_processed(&mut self, partner: PartnerId, ids: &[ComplianceId]) -> Result<u64, StoreError> {
        self.shared.take_failure(FailurePoint::MarkProcessed)?;
        let mut affected = 0;
        for id in ids {
            let eligible = match self.snapshot.compliance.get(id) {
                Some(record) => record.partner_id == partner && record.is_unprocessed(),
                None => false,
            };
            if !eligible || !self.committed_unprocessed(*id) {
                continue;
            }
            if let Some(record) = self.snapshot.compliance.get_mut(id) {
                record.processed = ProcessedFlag::Processed;
                self.flipped.insert(*id);
                affected += 1;
            }
        }
        Ok(affected)
    }
}

impl LandUseReferenceStore for MemorySession {
    async fn reference_geometries(
        &mut self,
        layer: &str,
        prefix: &str,
        codes: &FunctionCodeSet,
    ) -> Result<Vec<ReferenceGeometry>, StoreError> {
        self.shared.take_failure(FailurePoint::ReferenceFetch)?;
        Ok(self
            .snapshot
            .references
            .get(layer)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.spatial_id.starts_with(prefix) && codes.contains(&r.function_code))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl PartnerCatalogStore for MemorySession {
    async fn partner_name(&mut self, partner: PartnerId) -> Result<Option<String>, StoreError> {
        self.shared.take_failure(FailurePoint::CatalogRead)?;
        Ok(self.snapshot.catalog.get(&partner).cloned())
    }
}

impl RunSession for MemorySession {
    async fn commit(mut self) -> Result<(), StoreError> {
        if let Err(err) = self.shared.take_failure(FailurePoint::Commit) {
            self.finish_rolled_back();
            return Err(err);
        }
        {
            let mut tables = self.shared.tables.write();
            for id in &self.inserted {
                if let Some(record) = self.snapshot.compliance.get(id) {
                    tables.compliance.insert(*id, record.clone());
                }
            }
            for id in &self.flipped {
                if let Some(record) = tables.compliance.get_mut(id) {
                    record.processed = ProcessedFlag::Processed;
                }
            }
        }
        self.finished = true;
        self.shared.stats.lock().committed += 1;
        tracing::debug!(
            inserted = self.inserted.len(),
            flipped = self.flipped.len(),
            "memory session committed"
        );
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.finish_rolled_back();
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if !self.finished {
            self.finish_rolled_back();
        }
    }
}
