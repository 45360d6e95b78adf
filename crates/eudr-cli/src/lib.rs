//! # eudr-cli — Command-Line Interface
//!
//! Provides the `eudr` binary.
//!
//! ## Subcommands
//!
//! - `eudr run` — evaluate partners against PostgreSQL and print the
//!   compliance summary.
//! - `eudr tables` — print or check the effective land-use tables.
//! - `eudr evaluate` — intersect WKT files offline and print the
//!   per-match results.
//!
//! ```bash
//! DATABASE_URL=postgres://... eudr run --partner 1042 -v
//! eudr tables --tables ./tables.yaml --check
//! eudr evaluate --compliance farms.wkt --reference forest.wkt
//! ```

pub mod evaluate;
pub mod run;
pub mod tables;

use std::path::Path;

use anyhow::{Context, Result};

use eudr_core::LandUseTables;

/// Built-in tables, or the validated YAML override at `path`.
pub fn load_tables(path: Option<&Path>) -> Result<LandUseTables> {
    match path {
        Some(path) => {
            let tables = LandUseTables::from_path(path)
                .with_context(|| format!("failed to load land-use tables from {}", path.display()))?;
            tracing::info!(path = %path.display(), "land-use tables loaded");
            Ok(tables)
        }
        None => Ok(LandUseTables::default()),
    }
}

/// Render `value` as JSON, indented when `pretty`.
pub fn render_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.context("failed to serialize output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_path_gives_builtin_tables() {
        assert_eq!(load_tables(None).unwrap(), LandUseTables::default());
    }

    #[test]
    fn bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.yaml");
        std::fs::write(&path, "land_use: [not, a, map]").unwrap();
        let err = load_tables(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("tables.yaml"));
    }
}
