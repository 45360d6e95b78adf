//! # Processed-Flag Lifecycle
//!
//! Each compliance record moves through a single one-way transition:
//!
//! ```text
//! UNPROCESSED ──▶ PROCESSED (terminal)
//! ```
//!
//! Re-entry into `UNPROCESSED` is an administrative action outside this
//! stack and has no method here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use eudr_core::{ComplianceId, ComplianceRecord, ProcessedFlag, RunId};

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by a processed-flag transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    /// The record was already processed.
    #[error("compliance record {id} is already {state}")]
    AlreadyProcessed {
        /// Record id.
        id: ComplianceId,
        /// Its current state.
        state: ProcessedFlag,
    },
}

// ─── Transition Record ───────────────────────────────────────────────

/// Record of one flag transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagTransitionRecord {
    /// Record that transitioned.
    pub compliance_id: ComplianceId,
    /// State before the transition.
    pub from_state: ProcessedFlag,
    /// State after the transition.
    pub to_state: ProcessedFlag,
    /// Run that caused the transition.
    pub run_id: RunId,
    /// When the transition occurred (UTC).
    pub timestamp: DateTime<Utc>,
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// A compliance record's processed flag with its transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLifecycle {
    /// Record id.
    pub compliance_id: ComplianceId,
    /// Current flag.
    pub state: ProcessedFlag,
    /// Ordered log of transitions.
    pub transitions: Vec<FlagTransitionRecord>,
}

impl RecordLifecycle {
    /// Start tracking a record in its current state.
    pub fn new(compliance_id: ComplianceId, state: ProcessedFlag) -> Self {
        Self {
            compliance_id,
            state,
            transitions: Vec::new(),
        }
    }

    /// Start tracking `record`.
    pub fn from_record(record: &ComplianceRecord) -> Self {
        Self::new(record.id, record.processed)
    }

    /// Whether the record is in the terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state == ProcessedFlag::Processed
    }

    /// Flip the flag (UNPROCESSED → PROCESSED).
    pub fn mark_processed(&mut self, run_id: RunId) -> Result<&FlagTransitionRecord, FlagError> {
        self.require_unprocessed()?;
        Ok(self.do_transition(ProcessedFlag::Processed, run_id))
    }

    fn require_unprocessed(&self) -> Result<(), FlagError> {
        if self.is_terminal() {
            return Err(FlagError::AlreadyProcessed {
                id: self.compliance_id,
                state: self.state,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: ProcessedFlag, run_id: RunId) -> &FlagTransitionRecord {
        let from = self.state;
        self.state = to;
        self.transitions.push(FlagTransitionRecord {
            compliance_id: self.compliance_id,
            from_state: from,
            to_state: to,
            run_id,
            timestamp: Utc::now(),
        });
        &self.transitions[self.transitions.len() - 1]
    }
}
