//! # PostgreSQL Backend
//!
//! PostGIS-backed stores over SQLx. Each [`PgRunSession`] owns one database
//! transaction: the staged-row insert, every read, and the processed-flag
//! update of a run execute inside it, and nothing is visible to other
//! sessions until [`RunSession::commit`]. A session dropped without commit
//! is rolled back by SQLx when the transaction is dropped.
//!
//! ## Tables
//!
//! | Table | Role |
//! |-------|------|
//! | `ktv_dash_eudr_summ_dtl_p0g` | upstream staging view of farm polygons |
//! | `gis_int_eudr_compliance` | compliance records, `is_processed` flag |
//! | `gis_int_eudr_catalog` | partner display names |
//! | reference layer (configurable) | `gis_id`, `func_code`, `the_geom` |
//!
//! Geometry crosses the wire as WKT (`ST_AsText` / `ST_GeomFromText`).
//! The schema is owned upstream; this crate runs no migrations.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use eudr_core::{
    ComplianceId, ComplianceRecord, CountryId, FunctionCodeSet, LandUseStatus, PartnerId,
    ProcessedFlag, ReferenceGeometry, StagedRecord, SupplierId,
};

use crate::error::StoreError;
use crate::session::{
    ComplianceStore, LandUseReferenceStore, PartnerCatalogStore, RunSession,
    SupplierComplianceStore,
};

/// Connection pool sizing.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long `begin` waits for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Connect a pool to `url`.
pub async fn init_pool(url: &str, settings: &PoolSettings) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections.min(settings.max_connections))
        .acquire_timeout(settings.acquire_timeout)
        .connect(url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL");
            StoreError::from(e)
        })?;

    tracing::info!(max_connections = settings.max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Compliance store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgComplianceStore {
    pool: PgPool,
}

impl PgComplianceStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ComplianceStore for PgComplianceStore {
    type Session = PgRunSession;

    async fn begin(&self) -> Result<PgRunSession, StoreError> {
        let tx = self.pool.begin().await.map_err(logged("begin transaction"))?;
        Ok(PgRunSession { tx })
    }
}

/// A run's session: one open transaction.
#[derive(Debug)]
pub struct PgRunSession {
    tx: Transaction<'static, Postgres>,
}

fn logged(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "database operation failed");
        StoreError::from(e)
    }
}

/// Reject layer names that are not plain (optionally schema-qualified)
/// identifiers. The layer name is interpolated into SQL, so it cannot be a
/// bind parameter.
pub(crate) fn checked_layer(layer: &str) -> Result<&str, StoreError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    };
    let parts: Vec<&str> = layer.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| valid_part(p)) {
        Ok(layer)
    } else {
        Err(StoreError::InvalidLayer(layer.to_string()))
    }
}

/// Escape `LIKE` metacharacters so `prefix` matches literally.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl SupplierComplianceStore for PgRunSession {
    async fn staged_records(&mut self, partner: PartnerId) -> Result<Vec<StagedRecord>, StoreError> {
        let rows = sqlx::query_as::<_, StagedRow>(
            "SELECT supplier_id::bigint, supplier_display_id::text, farmnr::text, commo_id::bigint,
                    revision::integer, country_id::integer, province_id::bigint, district_id::bigint,
                    ST_AsText(polygeom) AS geometry_wkt, partner_id::bigint,
                    total_area::double precision, row_id::text
             FROM ktv_dash_eudr_summ_dtl_p0g WHERE partner_id = $1",
        )
        .bind(partner.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(logged("read staged rows"))?;

        Ok(rows.into_iter().map(StagedRow::into_record).collect())
    }

    async fn insert_compliance(&mut self, records: &[StagedRecord]) -> Result<u64, StoreError> {
        let mut affected = 0;
        for record in records {
            let result = sqlx::query(
                "INSERT INTO gis_int_eudr_compliance
                    (supplier_id, supplier_display_id, farmnr, commo_id, revision, country_id,
                     province_id, district_id, geom_polygon, partner_id, total_area,
                     def_stat, laf_stat, row_id, is_processed)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, ST_GeomFromText($9, 4326), $10, $11,
                         $12, $13, $14, 0)",
            )
            .bind(record.supplier_id.0)
            .bind(&record.supplier_display_id)
            .bind(&record.farm_number)
            .bind(record.commodity_id)
            .bind(record.revision)
            .bind(record.country_id.map(|c| c.0))
            .bind(record.province_id)
            .bind(record.district_id)
            .bind(&record.geometry_wkt)
            .bind(record.partner_id.0)
            .bind(record.declared_area)
            .bind(LandUseStatus::Compliant.as_str())
            .bind(LandUseStatus::Compliant.as_str())
            .bind(&record.row_id)
            .execute(&mut *self.tx)
            .await
            .map_err(logged("insert compliance record"))?;
            affected += result.rows_affected();
        }

        let expected = records.len() as u64;
        if affected != expected {
            tracing::error!(expected, affected, "compliance insert touched an unexpected row count");
            return Err(StoreError::PartialBatch { expected, affected });
        }
        Ok(affected)
    }

    async fn unprocessed_countries(&mut self, partner: PartnerId) -> Result<Vec<CountryId>, StoreError> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT DISTINCT country_id::integer FROM gis_int_eudr_compliance
             WHERE partner_id = $1 AND is_processed = 0 AND country_id IS NOT NULL
             ORDER BY 1",
        )
        .bind(partner.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(logged("list unprocessed countries"))?;

        Ok(ids.into_iter().map(CountryId).collect())
    }

    async fn unprocessed_records(
        &mut self,
        partner: PartnerId,
        country: Option<CountryId>,
    ) -> Result<Vec<ComplianceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ComplianceRow>(
            "SELECT id::bigint, supplier_id::bigint, supplier_display_id::text, farmnr::text,
                    commo_id::bigint, revision::integer, country_id::integer, province_id::bigint,
                    district_id::bigint, ST_AsText(geom_polygon) AS geometry_wkt,
                    partner_id::bigint, total_area::double precision, def_stat::text,
                    laf_stat::text, row_id::text, is_processed::smallint
             FROM gis_int_eudr_compliance
             WHERE partner_id = $1 AND is_processed = 0
               AND ($2::integer IS NULL OR country_id = $2)
             ORDER BY id",
        )
        .bind(partner.0)
        .bind(country.map(|c| c.0))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(logged("read unprocessed records"))?;

        Ok(rows.into_iter().map(ComplianceRow::into_record).collect())
    }

    async fn mark_processed(&mut self, partner: PartnerId, ids: &[ComplianceId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let result = sqlx::query(
            "UPDATE gis_int_eudr_compliance SET is_processed = 1
             WHERE partner_id = $1 AND is_processed = 0 AND id = ANY($2)",
        )
        .bind(partner.0)
        .bind(&raw)
        .execute(&mut *self.tx)
        .await
        .map_err(logged("mark records processed"))?;

        Ok(result.rows_affected())
    }
}

impl LandUseReferenceStore for PgRunSession {
    async fn reference_geometries(
        &mut self,
        layer: &str,
        prefix: &str,
        codes: &FunctionCodeSet,
    ) -> Result<Vec<ReferenceGeometry>, StoreError> {
        let layer = checked_layer(layer)?;
        let sql = format!(
            "SELECT gis_id::text AS spatial_id, func_code::text AS function_code,
                    ST_AsText(the_geom) AS geometry_wkt
             FROM {layer}
             WHERE gis_id LIKE $1 AND func_code::text = ANY($2)
             ORDER BY gis_id"
        );
        let rows = sqlx::query_as::<_, ReferenceRow>(&sql)
            .bind(like_prefix(prefix))
            .bind(codes.to_vec())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(logged("read reference geometries"))?;

        Ok(rows.into_iter().map(ReferenceRow::into_record).collect())
    }
}

impl PartnerCatalogStore for PgRunSession {
    async fn partner_name(&mut self, partner: PartnerId) -> Result<Option<String>, StoreError> {
        let name = sqlx::query_scalar::<_, Option<String>>(
            "SELECT partner_name::text FROM gis_int_eudr_catalog WHERE partner_id = $1 LIMIT 1",
        )
        .bind(partner.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(logged("read partner name"))?;

        Ok(name.flatten())
    }
}

impl RunSession for PgRunSession {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(logged("commit"))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(logged("rollback"))
    }
}

// ─── Row Types ──────────────────────────────────────────────────────

/// Internal row type for the staging view.
#[derive(sqlx::FromRow)]
struct StagedRow {
    supplier_id: i64,
    supplier_display_id: Option<String>,
    farmnr: Option<String>,
    commo_id: Option<i64>,
    revision: Option<i32>,
    country_id: Option<i32>,
    province_id: Option<i64>,
    district_id: Option<i64>,
    geometry_wkt: Option<String>,
    partner_id: i64,
    total_area: Option<f64>,
    row_id: String,
}

impl StagedRow {
    fn into_record(self) -> StagedRecord {
        StagedRecord {
            supplier_id: SupplierId(self.supplier_id),
            supplier_display_id: self.supplier_display_id,
            farm_number: self.farmnr,
            commodity_id: self.commo_id,
            revision: self.revision,
            country_id: self.country_id.map(CountryId),
            province_id: self.province_id,
            district_id: self.district_id,
            geometry_wkt: self.geometry_wkt,
            partner_id: PartnerId(self.partner_id),
            declared_area: self.total_area,
            row_id: self.row_id,
        }
    }
}

/// Internal row type for the compliance table.
#[derive(sqlx::FromRow)]
struct ComplianceRow {
    id: i64,
    supplier_id: i64,
    supplier_display_id: Option<String>,
    farmnr: Option<String>,
    commo_id: Option<i64>,
    revision: Option<i32>,
    country_id: Option<i32>,
    province_id: Option<i64>,
    district_id: Option<i64>,
    geometry_wkt: Option<String>,
    partner_id: i64,
    total_area: Option<f64>,
    def_stat: Option<String>,
    laf_stat: Option<String>,
    row_id: String,
    is_processed: i16,
}

fn decode_status(id: i64, column: &'static str, value: Option<&str>) -> LandUseStatus {
    match value.map(LandUseStatus::parse) {
        Some(Some(status)) => status,
        _ => {
            tracing::error!(id, column, value = ?value, "unknown status in database; reading as compliant");
            LandUseStatus::Compliant
        }
    }
}

impl ComplianceRow {
    fn into_record(self) -> ComplianceRecord {
        let deforestation_status = decode_status(self.id, "def_stat", self.def_stat.as_deref());
        let land_use_status = decode_status(self.id, "laf_stat", self.laf_stat.as_deref());
        ComplianceRecord {
            id: ComplianceId(self.id),
            supplier_id: SupplierId(self.supplier_id),
            supplier_display_id: self.supplier_display_id,
            farm_number: self.farmnr,
            commodity_id: self.commo_id,
            revision: self.revision,
            country_id: self.country_id.map(CountryId),
            province_id: self.province_id,
            district_id: self.district_id,
            geometry_wkt: self.geometry_wkt,
            partner_id: PartnerId(self.partner_id),
            declared_area: self.total_area,
            deforestation_status,
            land_use_status,
            row_id: self.row_id,
            processed: ProcessedFlag::from_i16(self.is_processed),
        }
    }
}

/// Internal row type for a reference layer.
#[derive(sqlx::FromRow)]
struct ReferenceRow {
    spatial_id: String,
    function_code: String,
    geometry_wkt: Option<String>,
}

impl ReferenceRow {
    fn into_record(self) -> ReferenceGeometry {
        ReferenceGeometry {
            spatial_id: self.spatial_id,
            function_code: self.function_code,
            geometry_wkt: self.geometry_wkt,
        }
    }
}
