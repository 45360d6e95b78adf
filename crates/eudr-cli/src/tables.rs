//! # Tables Subcommand
//!
//! Prints the effective land-use tables as YAML, or only validates them
//! with `--check`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use eudr_core::CountryId;

/// Arguments for the `eudr tables` subcommand.
#[derive(Args, Debug)]
pub struct TablesArgs {
    /// Validate the tables and print nothing on success.
    #[arg(long)]
    pub check: bool,

    /// Print the category keys per country instead of the full document.
    #[arg(long, conflicts_with = "check")]
    pub keys: bool,
}

/// Execute the tables subcommand.
pub fn run_tables(args: &TablesArgs, tables_path: Option<&Path>) -> Result<u8> {
    let tables = crate::load_tables(tables_path)?;

    if args.check {
        let countries = tables.land_use.len();
        let entries: usize = tables.land_use.values().map(Vec::len).sum();
        tracing::info!(countries, entries, layer = %tables.reference_layer, "land-use tables valid");
        return Ok(0);
    }

    if args.keys {
        for country in tables.land_use.keys() {
            println!("{}", describe_country(&tables, *country));
        }
        return Ok(0);
    }

    let yaml = serde_yaml::to_string(&tables).context("failed to render land-use tables")?;
    print!("{yaml}");
    Ok(0)
}

fn describe_country(tables: &eudr_core::LandUseTables, country: CountryId) -> String {
    let keys: Vec<String> = tables
        .entries(country)
        .iter()
        .map(|entry| format!("{}={}", entry.key(), entry.function_codes))
        .collect();
    format!(
        "{country} ({}): {}",
        tables.country_code(country).unwrap_or("-"),
        keys.join(" ")
    )
}
