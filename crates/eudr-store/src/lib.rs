//! # eudr-store — Persistence Collaborators
//!
//! Traits for the three stores a compliance run reads from and writes to,
//! the per-run [`RunSession`] that replaces a process-wide connection, and
//! two backends:
//!
//! - [`memory::MemoryStore`]: snapshot-isolated in-memory tables with
//!   failure injection, used by tests and offline tooling.
//! - [`postgres::PgComplianceStore`]: PostgreSQL/PostGIS via SQLx. Each
//!   session owns one database transaction.
//!
//! The traits use native `async fn` and are consumed through generics, not
//! trait objects.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod session;

pub use error::StoreError;
pub use memory::{FailurePoint, MemorySession, MemoryStore};
pub use postgres::{init_pool, PgComplianceStore, PgRunSession, PoolSettings};
pub use session::{
    ComplianceStore, LandUseReferenceStore, PartnerCatalogStore, RunSession,
    SupplierComplianceStore,
};
