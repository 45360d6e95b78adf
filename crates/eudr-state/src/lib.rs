//! # eudr-state — Processed-Flag State Machine
//!
//! - [`flag`]: the per-record `UNPROCESSED → PROCESSED` lifecycle with its
//!   transition log.
//! - [`tracker`]: the ProcessingStateTracker. It collects the records a
//!   run visits and commits their flag flips in one atomic step, rolling
//!   the run's session back on any failure.

pub mod flag;
pub mod tracker;

pub use flag::{FlagError, FlagTransitionRecord, RecordLifecycle};
pub use tracker::{rollback, CommitReport, ProcessingTracker, TrackerError};
