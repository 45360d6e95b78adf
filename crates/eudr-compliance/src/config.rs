//! # Run Configuration

use serde::{Deserialize, Serialize};

use eudr_geo::AreaMode;

/// What a category count counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCounting {
    /// One unit per (compliance polygon, reference polygon) match. A farm
    /// overlapping two reference polygons of a category counts twice.
    #[default]
    PerMatch,
    /// One unit per compliance polygon with at least one match.
    PerPolygon,
}

/// Per-run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Counting policy for category counts.
    pub counting: MatchCounting,
    /// How hectare figures are measured.
    pub area_mode: AreaMode,
    /// Copy the partner's staged rows into the compliance table first.
    pub ingest_staged: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            counting: MatchCounting::PerMatch,
            area_mode: AreaMode::Planar,
            ingest_staged: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.counting, MatchCounting::PerMatch);
        assert_eq!(config.area_mode, AreaMode::Planar);
        assert!(config.ingest_staged);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"counting":"per_polygon"}"#).unwrap();
        assert_eq!(config.counting, MatchCounting::PerPolygon);
        assert!(config.ingest_staged);
    }
}
