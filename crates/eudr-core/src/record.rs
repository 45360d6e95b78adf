//! # Record Types
//!
//! Rows exchanged with the persistence collaborators:
//!
//! - [`StagedRecord`] — a farm polygon as delivered by upstream ingestion,
//!   before it enters the compliance table.
//! - [`ComplianceRecord`] — a row of the compliance table. Mutated by this
//!   stack only through its processed flag.
//! - [`ReferenceGeometry`] — a land-cover polygon of a reference layer.
//!
//! Geometry is carried as WKT text; `None` means the row has no geometry
//! and is silently excluded from evaluation.

use serde::{Deserialize, Serialize};

use crate::identity::{ComplianceId, CountryId, PartnerId, SupplierId};

/// Processed flag of a compliance record (`0` or `1` in the table).
///
/// The flag is monotonic: `Unprocessed → Processed`, never back. The
/// transition itself is enforced by `eudr-state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessedFlag {
    /// The record has not yet been evaluated (`0`).
    Unprocessed,
    /// The record was consumed by a committed run (`1`).
    Processed,
}

impl ProcessedFlag {
    /// Column value stored in the compliance table.
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Unprocessed => 0,
            Self::Processed => 1,
        }
    }

    /// Interpret a column value. Any non-zero value counts as processed.
    pub fn from_i16(value: i16) -> Self {
        if value == 0 {
            Self::Unprocessed
        } else {
            Self::Processed
        }
    }
}

impl std::fmt::Display for ProcessedFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unprocessed => "UNPROCESSED",
            Self::Processed => "PROCESSED",
        };
        f.write_str(s)
    }
}

/// Deforestation / land-use-area status stored alongside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandUseStatus {
    /// No finding recorded against the farm.
    Compliant,
    /// A finding was recorded against the farm.
    NonCompliant,
}

impl LandUseStatus {
    /// Column text for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
        }
    }

    /// Parse column text; unknown values map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "compliant" => Some(Self::Compliant),
            "non_compliant" => Some(Self::NonCompliant),
            _ => None,
        }
    }
}

/// A supplier farm polygon awaiting ingestion into the compliance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRecord {
    /// Supplier owning the farm.
    pub supplier_id: SupplierId,
    /// Human-facing supplier identifier.
    pub supplier_display_id: Option<String>,
    /// Farm number within the supplier.
    pub farm_number: Option<String>,
    /// Commodity identifier.
    pub commodity_id: Option<i64>,
    /// Revision of the farm declaration.
    pub revision: Option<i32>,
    /// Country of the farm, if the upstream row carries one.
    pub country_id: Option<CountryId>,
    /// Province of the farm.
    pub province_id: Option<i64>,
    /// District of the farm.
    pub district_id: Option<i64>,
    /// Farm boundary as WKT.
    pub geometry_wkt: Option<String>,
    /// Partner the supplier delivers to.
    pub partner_id: PartnerId,
    /// Declared total farm area.
    pub declared_area: Option<f64>,
    /// Unique upstream row identifier.
    pub row_id: String,
}

/// A row of the compliance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    /// Row identifier.
    pub id: ComplianceId,
    /// Supplier owning the farm.
    pub supplier_id: SupplierId,
    /// Human-facing supplier identifier.
    pub supplier_display_id: Option<String>,
    /// Farm number within the supplier.
    pub farm_number: Option<String>,
    /// Commodity identifier.
    pub commodity_id: Option<i64>,
    /// Revision of the farm declaration.
    pub revision: Option<i32>,
    /// Country of the farm, if the upstream row carries one.
    pub country_id: Option<CountryId>,
    /// Province of the farm.
    pub province_id: Option<i64>,
    /// District of the farm.
    pub district_id: Option<i64>,
    /// Farm boundary as WKT.
    pub geometry_wkt: Option<String>,
    /// Partner the supplier delivers to.
    pub partner_id: PartnerId,
    /// Declared total farm area.
    pub declared_area: Option<f64>,
    /// Deforestation status.
    pub deforestation_status: LandUseStatus,
    /// Land-use-area status.
    pub land_use_status: LandUseStatus,
    /// Unique upstream row identifier.
    pub row_id: String,
    /// Processed flag.
    pub processed: ProcessedFlag,
}

impl ComplianceRecord {
    /// Build the compliance row for a freshly ingested staged record.
    ///
    /// New rows start unprocessed with both status flags `compliant`.
    pub fn from_staged(id: ComplianceId, staged: StagedRecord) -> Self {
        Self {
            id,
            supplier_id: staged.supplier_id,
            supplier_display_id: staged.supplier_display_id,
            farm_number: staged.farm_number,
            commodity_id: staged.commodity_id,
            revision: staged.revision,
            country_id: staged.country_id,
            province_id: staged.province_id,
            district_id: staged.district_id,
            geometry_wkt: staged.geometry_wkt,
            partner_id: staged.partner_id,
            declared_area: staged.declared_area,
            deforestation_status: LandUseStatus::Compliant,
            land_use_status: LandUseStatus::Compliant,
            row_id: staged.row_id,
            processed: ProcessedFlag::Unprocessed,
        }
    }

    /// Whether the record still participates in computation.
    pub fn is_unprocessed(&self) -> bool {
        self.processed == ProcessedFlag::Unprocessed
    }
}

/// A land-cover polygon of a reference layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGeometry {
    /// Country-scoped spatial identifier (prefixed by the country id).
    pub spatial_id: String,
    /// Land-use function code.
    pub function_code: String,
    /// Polygon as WKT.
    pub geometry_wkt: Option<String>,
}
