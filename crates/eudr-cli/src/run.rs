//! # Run Subcommand
//!
//! Evaluates one or more partners against PostgreSQL. Partners run one
//! after another, each in its own transaction, and their outcomes are
//! folded into a single summary printed as JSON on stdout.
//!
//! The first failing partner stops the command. Partners committed before
//! it stay committed.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use eudr_compliance::{ComplianceRun, ComplianceSummary, MatchCounting, RunConfig};
use eudr_core::PartnerId;
use eudr_geo::AreaMode;
use eudr_store::{init_pool, PgComplianceStore, PoolSettings};

/// Counting policy for category counts.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingArg {
    /// Every (farm, reference polygon) match counts.
    PerMatch,
    /// Every farm with at least one match counts once.
    PerPolygon,
}

impl From<CountingArg> for MatchCounting {
    fn from(arg: CountingArg) -> Self {
        match arg {
            CountingArg::PerMatch => MatchCounting::PerMatch,
            CountingArg::PerPolygon => MatchCounting::PerPolygon,
        }
    }
}

/// Arguments for the `eudr run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Partner to evaluate. Repeat for several partners.
    #[arg(long = "partner", short = 'p', value_name = "ID", required = true)]
    pub partners: Vec<i64>,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Maximum pooled connections.
    #[arg(long, default_value_t = 20)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection.
    #[arg(long, default_value_t = 5)]
    pub acquire_timeout: u64,

    /// Category counting policy.
    #[arg(long, value_enum, default_value_t = CountingArg::PerMatch)]
    pub counting: CountingArg,

    /// Report hectares from planar native areas instead of geodesic ones.
    /// Only meaningful for metre-based projected coordinates; stored rows
    /// are lon/lat (SRID 4326).
    #[arg(long)]
    pub planar: bool,

    /// Skip copying staged rows into the compliance table.
    #[arg(long)]
    pub no_ingest: bool,

    /// Pretty-print the JSON summary.
    #[arg(long)]
    pub pretty: bool,
}

impl RunArgs {
    /// Run configuration selected by the flags.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            counting: self.counting.into(),
            area_mode: if self.planar {
                AreaMode::Planar
            } else {
                AreaMode::Geodesic
            },
            ingest_staged: !self.no_ingest,
        }
    }

    /// Pool sizing selected by the flags.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections.max(1),
            acquire_timeout: Duration::from_secs(self.acquire_timeout),
            ..PoolSettings::default()
        }
    }
}

/// Execute the run subcommand.
pub async fn run_partners(args: &RunArgs, tables_path: Option<&Path>) -> Result<u8> {
    let tables = crate::load_tables(tables_path)?;
    let pool = init_pool(&args.database_url, &args.pool_settings())
        .await
        .context("failed to connect to PostgreSQL")?;
    let store = PgComplianceStore::new(pool);
    let runner = ComplianceRun::new(&tables, args.run_config());

    let mut summary = ComplianceSummary::new();
    for partner in &args.partners {
        let partner = PartnerId(*partner);
        let report = runner
            .run_partner(&store, partner, &mut summary)
            .await
            .with_context(|| format!("compliance run failed for partner {partner}"))?;
        tracing::info!(
            partner_id = %partner,
            run_id = %report.run_id,
            flipped = report.commit.flipped,
            "partner evaluated"
        );
    }

    println!("{}", crate::render_json(&summary, args.pretty)?);
    store.pool().close().await;
    Ok(0)
}
