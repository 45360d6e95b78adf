//! # eudr CLI entry point
//!
//! Parses command-line arguments, initialises logging, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eudr_cli::evaluate::{run_evaluate, EvaluateArgs};
use eudr_cli::run::{run_partners, RunArgs};
use eudr_cli::tables::{run_tables, TablesArgs};

/// EUDR land-use compliance toolchain.
///
/// Intersects supplier farm polygons with reference land-use layers and
/// reports per-category overlap counts per partner and country.
#[derive(Parser, Debug)]
#[command(name = "eudr", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    /// Ignored when RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// YAML file overriding the built-in land-use tables.
    #[arg(long, env = "EUDR_TABLES", global = true, value_name = "PATH")]
    tables: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate partners against PostgreSQL and print the summary.
    Run(RunArgs),

    /// Print or check the effective land-use tables.
    Tables(TablesArgs),

    /// Intersect WKT files offline and print per-match results.
    Evaluate(EvaluateArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "eudr CLI starting");

    let tables = cli.tables.as_deref();
    let result = match &cli.command {
        Commands::Run(args) => run_partners(args, tables).await,
        Commands::Tables(args) => run_tables(args, tables),
        Commands::Evaluate(args) => run_evaluate(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
