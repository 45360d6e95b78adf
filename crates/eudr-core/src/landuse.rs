//! # Land-Use Configuration Tables
//!
//! Static lookup data consumed by the compliance run:
//!
//! - **CountryCodeTable** — country id → country code (`10 → "ind"`).
//! - **LandUseConfigTable** — country id → ordered list of
//!   `{function codes, category, display name}` entries.
//! - The name of the reference layer the function codes refer to.
//!
//! [`LandUseTables::default`] reproduces the production tables. A YAML
//! document can replace them wholesale:
//!
//! ```yaml
//! reference_layer: gis_int_idn_klhk_fkh2019
//! country_codes:
//!   10: ind
//! land_use:
//!   10:
//!     - function_codes: ["1001"]
//!       category: protected_forest
//!       display_name: Protected Forest
//! ```
//!
//! A country absent from `land_use` is *unconfigured*: [`LandUseTables::entries`]
//! returns an empty slice and the run produces an empty category breakdown
//! for it. This is a lookup result, not an error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::CountryId;

/// Reference layer used when a tables document does not name one.
pub const DEFAULT_REFERENCE_LAYER: &str = "gis_int_idn_klhk_fkh2019";

/// Derive the summary key of a category from its display name.
///
/// Lower-cases the name and replaces every space with `_`:
/// `"Fixed Production Forest" → "fixed_production_forest"`.
pub fn category_key(display_name: &str) -> String {
    display_name.to_lowercase().replace(' ', "_")
}

/// Set of reference function codes selected by one configuration entry.
///
/// Ordered, so two entries listing the same codes in a different order
/// address the same reference subset (and share a spatial index).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionCodeSet(BTreeSet<String>);

impl FunctionCodeSet {
    /// Build a set from any list of codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    /// Whether `code` belongs to the set.
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// Codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Codes as an owned vector, for binding to a SQL `ANY($n)` parameter.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FunctionCodeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<&str> = self.codes().collect();
        write!(f, "{{{}}}", joined.join(","))
    }
}

/// One land-use category check configured for a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandUseConfigEntry {
    /// Reference function codes that make up this category.
    pub function_codes: FunctionCodeSet,
    /// Regulatory category (`protected_forest`, `production_forest`).
    pub category: String,
    /// Human-readable land-use type; the summary key is derived from it.
    pub display_name: String,
}

impl LandUseConfigEntry {
    /// Convenience constructor.
    pub fn new<I, S>(codes: I, category: &str, display_name: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function_codes: FunctionCodeSet::new(codes),
            category: category.to_string(),
            display_name: display_name.to_string(),
        }
    }

    /// Summary key for this entry.
    pub fn key(&self) -> String {
        category_key(&self.display_name)
    }
}

/// Country codes, land-use entries, and the reference layer name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandUseTables {
    /// Reference layer the function codes are looked up in.
    #[serde(default = "default_reference_layer")]
    pub reference_layer: String,
    /// Country id → country code.
    #[serde(default)]
    pub country_codes: BTreeMap<CountryId, String>,
    /// Country id → ordered land-use entries.
    #[serde(default)]
    pub land_use: BTreeMap<CountryId, Vec<LandUseConfigEntry>>,
}

fn default_reference_layer() -> String {
    DEFAULT_REFERENCE_LAYER.to_string()
}

impl Default for LandUseTables {
    fn default() -> Self {
        let mut country_codes = BTreeMap::new();
        country_codes.insert(CountryId(10), "ind".to_string());
        country_codes.insert(CountryId(58), "tha".to_string());

        let mut land_use = BTreeMap::new();
        land_use.insert(
            CountryId(10),
            vec![
                LandUseConfigEntry::new(["1001"], "protected_forest", "Protected Forest"),
                LandUseConfigEntry::new(["1003"], "production_forest", "Fixed Production Forest"),
                LandUseConfigEntry::new(["1004"], "production_forest", "Limited Production Forest"),
                LandUseConfigEntry::new(["1004"], "production_forest", "Conversion Production Forest"),
                LandUseConfigEntry::new(["1004"], "production_forest", "Conservation Forest"),
            ],
        );
        land_use.insert(
            CountryId(58),
            vec![
                LandUseConfigEntry::new(["1004"], "production_forest", "Conservation Forest"),
                LandUseConfigEntry::new(["1004"], "production_forest", "Protected Forest"),
            ],
        );

        Self {
            reference_layer: default_reference_layer(),
            country_codes,
            land_use,
        }
    }
}

impl LandUseTables {
    /// Parse and validate a YAML tables document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let tables: Self = serde_yaml::from_str(yaml)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Read, parse, and validate a YAML tables file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check structural invariants of the tables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_layer.trim().is_empty() {
            return Err(ConfigError::EmptyReferenceLayer);
        }
        for country in self.country_codes.keys().chain(self.land_use.keys()) {
            if country.0 <= 0 {
                return Err(ConfigError::InvalidCountry(country.0));
            }
        }
        for (country, entries) in &self.land_use {
            for (index, entry) in entries.iter().enumerate() {
                if entry.display_name.trim().is_empty() {
                    return Err(ConfigError::EmptyDisplayName {
                        country: country.0,
                        index,
                    });
                }
                if entry.key() == "country" {
                    return Err(ConfigError::ReservedCategoryKey {
                        country: country.0,
                        display_name: entry.display_name.clone(),
                    });
                }
                if entry.function_codes.is_empty() {
                    return Err(ConfigError::EmptyFunctionCodes {
                        country: country.0,
                        display_name: entry.display_name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Land-use entries configured for `country`; empty when unconfigured.
    pub fn entries(&self, country: CountryId) -> &[LandUseConfigEntry] {
        self.land_use.get(&country).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `country` has at least one land-use entry.
    pub fn is_configured(&self, country: CountryId) -> bool {
        !self.entries(country).is_empty()
    }

    /// Country code for `country`, if known.
    pub fn country_code(&self, country: CountryId) -> Option<&str> {
        self.country_codes.get(&country).map(String::as_str)
    }
}
