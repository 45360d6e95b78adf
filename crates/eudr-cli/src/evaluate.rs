//! # Evaluate Subcommand
//!
//! Intersects two newline-separated WKT files without a database. Each
//! non-blank line not starting with `#` is one polygon. Compliance polygons
//! are numbered by line; reference polygons are identified as `line-<n>`.
//! Prints the per-match results as a JSON array.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use eudr_core::{
    ComplianceId, ComplianceRecord, LandUseStatus, PartnerId, ProcessedFlag,
    ReferenceGeometry, SupplierId,
};
use eudr_geo::{AreaMode, IntersectionEngine, IntersectionResult};

/// Arguments for the `eudr evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// File of compliance polygons, one WKT per line.
    #[arg(long, value_name = "FILE")]
    pub compliance: PathBuf,

    /// File of reference polygons, one WKT per line.
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Function code assigned to every reference polygon.
    #[arg(long, default_value = "")]
    pub function_code: String,

    /// Report hectares from geodesic areas (lon/lat input).
    #[arg(long)]
    pub geodesic: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the evaluate subcommand.
pub fn run_evaluate(args: &EvaluateArgs) -> Result<u8> {
    let compliance = read_wkt_lines(&args.compliance)?;
    let reference = read_wkt_lines(&args.reference)?;

    let results = evaluate_lines(&compliance, &reference, &args.function_code, area_mode(args.geodesic));
    tracing::info!(
        compliance = compliance.len(),
        reference = reference.len(),
        matches = results.len(),
        "offline evaluation complete"
    );
    println!("{}", crate::render_json(&results, args.pretty)?);
    Ok(0)
}

fn area_mode(geodesic: bool) -> AreaMode {
    if geodesic {
        AreaMode::Geodesic
    } else {
        AreaMode::Planar
    }
}

/// Non-comment, non-blank lines of `path` with their 1-based line numbers.
fn read_wkt_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_wkt_lines(&text))
}

fn parse_wkt_lines(text: &str) -> Vec<(usize, String)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| (n, line.to_string()))
        .collect()
}

fn evaluate_lines(
    compliance: &[(usize, String)],
    reference: &[(usize, String)],
    function_code: &str,
    mode: AreaMode,
) -> Vec<IntersectionResult> {
    let records: Vec<ComplianceRecord> = compliance
        .iter()
        .map(|(line, wkt)| ComplianceRecord {
            id: ComplianceId(*line as i64),
            supplier_id: SupplierId(0),
            supplier_display_id: None,
            farm_number: None,
            commodity_id: None,
            revision: None,
            country_id: None,
            province_id: None,
            district_id: None,
            geometry_wkt: Some(wkt.clone()),
            partner_id: PartnerId(0),
            declared_area: None,
            deforestation_status: LandUseStatus::Compliant,
            land_use_status: LandUseStatus::Compliant,
            row_id: format!("line-{line}"),
            processed: ProcessedFlag::Unprocessed,
        })
        .collect();
    let references: Vec<ReferenceGeometry> = reference
        .iter()
        .map(|(line, wkt)| ReferenceGeometry {
            spatial_id: format!("line-{line}"),
            function_code: function_code.to_string(),
            geometry_wkt: Some(wkt.clone()),
        })
        .collect();

    IntersectionEngine::new(mode).intersect(&records, &references)
}
