//! # Processing State Tracker
//!
//! Collects the compliance records a run visits and flips their processed
//! flags in one atomic step at the end of the run.
//!
//! ## Commit contract
//!
//! [`ProcessingTracker::commit`] consumes the run's session:
//!
//! 1. Issue one batch update for exactly the visited ids.
//! 2. If the backend reports a different affected count, the batch is
//!    partial: roll back and fail with [`StoreError::PartialBatch`].
//! 3. Commit the session. Staged inserts made earlier in the same session
//!    become visible together with the flag flips.
//!
//! Any failure rolls the whole session back. Either every visited record
//! ends up processed, or none does.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use eudr_core::{ComplianceId, ComplianceRecord, PartnerId, RunId};
use eudr_store::{RunSession, StoreError};

use crate::flag::{FlagError, FlagTransitionRecord, RecordLifecycle};

/// Errors raised while tracking or committing processed flags.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A record could not enter the tracker.
    #[error(transparent)]
    Flag(#[from] FlagError),

    /// A record of another partner was offered to the tracker.
    #[error("compliance record {id} belongs to partner {actual}, not {expected}")]
    ForeignRecord {
        /// Record id.
        id: ComplianceId,
        /// Partner the tracker was opened for.
        expected: PartnerId,
        /// Partner the record belongs to.
        actual: PartnerId,
    },

    /// The batch update or the commit failed; the session was rolled back.
    #[error("processed-flag commit failed: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    /// Partner whose records were flipped.
    pub partner_id: PartnerId,
    /// Run that committed.
    pub run_id: RunId,
    /// Number of records flipped.
    pub flipped: u64,
    /// Per-record transition log.
    pub transitions: Vec<FlagTransitionRecord>,
    /// When the commit completed (UTC).
    pub committed_at: DateTime<Utc>,
}

/// Tracks the records visited by one partner run.
#[derive(Debug)]
pub struct ProcessingTracker {
    partner_id: PartnerId,
    run_id: RunId,
    visited: BTreeMap<ComplianceId, RecordLifecycle>,
}

impl ProcessingTracker {
    /// Open a tracker for `partner_id` within run `run_id`.
    pub fn new(partner_id: PartnerId, run_id: RunId) -> Self {
        Self {
            partner_id,
            run_id,
            visited: BTreeMap::new(),
        }
    }

    /// Partner the tracker was opened for.
    pub fn partner_id(&self) -> PartnerId {
        self.partner_id
    }

    /// Record that `record` was read by the run.
    ///
    /// Returns `false` when the record was already visited. Fails for a
    /// record that is already processed or belongs to another partner.
    pub fn visit(&mut self, record: &ComplianceRecord) -> Result<bool, TrackerError> {
        if record.partner_id != self.partner_id {
            return Err(TrackerError::ForeignRecord {
                id: record.id,
                expected: self.partner_id,
                actual: record.partner_id,
            });
        }
        if !record.is_unprocessed() {
            return Err(FlagError::AlreadyProcessed {
                id: record.id,
                state: record.processed,
            }
            .into());
        }
        if self.visited.contains_key(&record.id) {
            return Ok(false);
        }
        self.visited.insert(record.id, RecordLifecycle::from_record(record));
        Ok(true)
    }

    /// Visit every record in `records`. Returns how many were new.
    pub fn visit_all<'a, I>(&mut self, records: I) -> Result<usize, TrackerError>
    where
        I: IntoIterator<Item = &'a ComplianceRecord>,
    {
        let mut added = 0;
        for record in records {
            if self.visit(record)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Visited ids, ascending.
    pub fn visited_ids(&self) -> Vec<ComplianceId> {
        self.visited.keys().copied().collect()
    }

    /// Number of visited records.
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    /// Whether no record was visited.
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Flip every visited record and commit `session`.
    pub async fn commit<S: RunSession>(mut self, mut session: S) -> Result<CommitReport, TrackerError> {
        let ids = self.visited_ids();
        let expected = ids.len() as u64;

        let affected = match session.mark_processed(self.partner_id, &ids).await {
            Ok(affected) => affected,
            Err(err) => {
                rollback(session, &err).await;
                return Err(err.into());
            }
        };
        if affected != expected {
            let err = StoreError::PartialBatch { expected, affected };
            rollback(session, &err).await;
            return Err(err.into());
        }

        session.commit().await.map_err(|err| {
            tracing::error!(
                partner_id = %self.partner_id,
                run_id = %self.run_id,
                error = %err,
                "session commit failed; processed flags not written"
            );
            TrackerError::Store(err)
        })?;

        let mut transitions = Vec::with_capacity(self.visited.len());
        for lifecycle in self.visited.values_mut() {
            transitions.push(lifecycle.mark_processed(self.run_id)?.clone());
        }

        tracing::info!(
            partner_id = %self.partner_id,
            run_id = %self.run_id,
            flipped = affected,
            "processed flags committed"
        );
        Ok(CommitReport {
            partner_id: self.partner_id,
            run_id: self.run_id,
            flipped: affected,
            transitions,
            committed_at: Utc::now(),
        })
    }

    /// Abandon the run: roll `session` back without flipping anything.
    pub async fn abort<S: RunSession>(self, session: S, cause: &dyn std::fmt::Display) {
        tracing::warn!(
            partner_id = %self.partner_id,
            run_id = %self.run_id,
            visited = self.visited.len(),
            "run aborted; rolling back"
        );
        rollback(session, cause).await;
    }
}

/// Roll `session` back after `cause`, logging a rollback failure.
pub async fn rollback<S: RunSession>(session: S, cause: &dyn std::fmt::Display) {
    tracing::error!(cause = %cause, "rolling back run session");
    if let Err(err) = session.rollback().await {
        tracing::error!(error = %err, "rollback failed; backend discards the transaction on disconnect");
    }
}
