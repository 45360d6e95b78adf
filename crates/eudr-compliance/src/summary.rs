//! # Compliance Summary
//!
//! The nested output of compliance runs:
//!
//! ```text
//! partnerId → { "data_redshift": [ingested...],
//!               "partner_name":  [name...],
//!               countryId → { "country": [code...],
//!                             categoryKey: [count...], ... } }
//! ```
//!
//! Every list is append-only. A summary reused across runs therefore
//! carries one entry per run in each category list. The country-code list
//! is the exception: it behaves as an insertion-ordered set.

use std::collections::BTreeMap;

use serde::Serialize;

use eudr_core::{CountryId, PartnerId};

/// Per-country breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountrySummary {
    /// Country codes seen for this country, without duplicates.
    pub country: Vec<String>,
    /// Category key → match count per run.
    #[serde(flatten)]
    pub categories: BTreeMap<String, Vec<usize>>,
}

impl CountrySummary {
    /// Counts recorded for `key`, oldest first.
    pub fn counts(&self, key: &str) -> Option<&[usize]> {
        self.categories.get(key).map(Vec::as_slice)
    }

    /// Append `code` unless it is already listed.
    pub fn note_country_code(&mut self, code: &str) {
        if !self.country.iter().any(|c| c == code) {
            self.country.push(code.to_string());
        }
    }

    /// Append `count` to the list of `key`.
    pub fn append_count(&mut self, key: &str, count: usize) {
        self.categories.entry(key.to_string()).or_default().push(count);
    }
}

/// Per-partner annotations and countries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartnerSummary {
    /// Staged rows ingested, per run.
    pub data_redshift: Vec<u64>,
    /// Partner display name, per run.
    pub partner_name: Vec<String>,
    /// Country breakdowns.
    #[serde(flatten)]
    pub countries: BTreeMap<CountryId, CountrySummary>,
}

impl PartnerSummary {
    /// Breakdown of `country`, if any run touched it.
    pub fn country(&self, country: CountryId) -> Option<&CountrySummary> {
        self.countries.get(&country)
    }
}

/// Accumulated results of compliance runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ComplianceSummary {
    partners: BTreeMap<PartnerId, PartnerSummary>,
}

impl ComplianceSummary {
    /// An empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry of `partner`, if any run touched it.
    pub fn partner(&self, partner: PartnerId) -> Option<&PartnerSummary> {
        self.partners.get(&partner)
    }

    /// Breakdown of `country` under `partner`.
    pub fn country(&self, partner: PartnerId, country: CountryId) -> Option<&CountrySummary> {
        self.partner(partner).and_then(|p| p.country(country))
    }

    /// Partners present, ascending.
    pub fn partners(&self) -> impl Iterator<Item = (&PartnerId, &PartnerSummary)> {
        self.partners.iter()
    }

    /// Whether no partner is present.
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    /// Append a run's partner annotations.
    pub fn annotate_partner(&mut self, partner: PartnerId, ingested: u64, name: &str) {
        let entry = self.partner_entry(partner);
        entry.data_redshift.push(ingested);
        entry.partner_name.push(name.to_string());
    }

    pub(crate) fn partner_entry(&mut self, partner: PartnerId) -> &mut PartnerSummary {
        self.partners.entry(partner).or_default()
    }

    pub(crate) fn country_entry(&mut self, partner: PartnerId, country: CountryId) -> &mut CountrySummary {
        self.partner_entry(partner).countries.entry(country).or_default()
    }

    /// Render as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "compliance summary did not serialize");
            serde_json::Value::Null
        })
    }
}
