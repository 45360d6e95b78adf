//! # Compliance Aggregator
//!
//! Folds per-category match counts into a [`ComplianceSummary`].

use std::collections::BTreeSet;

use serde::Serialize;

use eudr_core::{CountryId, PartnerId};
use eudr_geo::IntersectionResult;

use crate::config::MatchCounting;
use crate::summary::ComplianceSummary;

/// Match count of one land-use configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    /// Category key derived from the entry's display name.
    pub key: String,
    /// Matches counted for the entry.
    pub count: usize,
}

/// Counts intersection results and appends them to a summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceAggregator {
    counting: MatchCounting,
}

impl ComplianceAggregator {
    /// Create an aggregator with the given counting policy.
    pub fn new(counting: MatchCounting) -> Self {
        Self { counting }
    }

    /// Count `results` under the configured policy.
    pub fn count(&self, results: &[IntersectionResult]) -> usize {
        match self.counting {
            MatchCounting::PerMatch => results.len(),
            MatchCounting::PerPolygon => results
                .iter()
                .map(|r| r.compliance_id)
                .collect::<BTreeSet<_>>()
                .len(),
        }
    }

    /// Append one run's counts for `country` under `partner`.
    ///
    /// `country_code` is added to the country's code list if not already
    /// present; `None` adds nothing. Each count is appended to its
    /// category list, never overwriting earlier entries. An empty `counts`
    /// still creates the country entry.
    pub fn aggregate(
        &self,
        summary: &mut ComplianceSummary,
        partner: PartnerId,
        country: CountryId,
        country_code: Option<&str>,
        counts: &[CategoryCount],
    ) {
        let entry = summary.country_entry(partner, country);
        if let Some(code) = country_code {
            entry.note_country_code(code);
        }
        for CategoryCount { key, count } in counts {
            entry.append_count(key, *count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eudr_core::{ComplianceId, SupplierId};
    use geo_types::MultiPolygon;
    use proptest::prelude::*;

    fn result(compliance: i64, reference: &str) -> IntersectionResult {
        IntersectionResult {
            compliance_id: ComplianceId(compliance),
            supplier_id: SupplierId(1),
            reference_id: reference.to_string(),
            function_code: "1001".to_string(),
            intersection: MultiPolygon::new(Vec::new()),
            intersection_area_ha: 1.0,
            total_area_ha: 1.0,
            intersection_percent: 100.0,
        }
    }

    fn counts(pairs: &[(&str, usize)]) -> Vec<CategoryCount> {
        pairs
            .iter()
            .map(|(key, count)| CategoryCount {
                key: key.to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn per_match_counts_every_result() {
        let results = vec![result(1, "a"), result(1, "b"), result(2, "a")];
        assert_eq!(ComplianceAggregator::new(MatchCounting::PerMatch).count(&results), 3);
    }

    #[test]
    fn per_polygon_counts_distinct_compliance_records() {
        let results = vec![result(1, "a"), result(1, "b"), result(2, "a")];
        assert_eq!(ComplianceAggregator::new(MatchCounting::PerPolygon).count(&results), 2);
    }

    #[test]
    fn aggregate_appends_and_dedups_codes() {
        let aggregator = ComplianceAggregator::default();
        let mut summary = ComplianceSummary::new();
        let run = counts(&[("protected_forest", 1), ("conservation_forest", 0)]);
        aggregator.aggregate(&mut summary, PartnerId(1), CountryId(10), Some("ind"), &run);
        aggregator.aggregate(&mut summary, PartnerId(1), CountryId(10), Some("ind"), &run);

        let country = summary.country(PartnerId(1), CountryId(10)).unwrap();
        assert_eq!(country.country, vec!["ind"]);
        assert_eq!(country.counts("protected_forest"), Some(&[1, 1][..]));
        assert_eq!(country.counts("conservation_forest"), Some(&[0, 0][..]));
    }

    #[test]
    fn unknown_code_and_no_entries_leave_an_empty_breakdown() {
        let aggregator = ComplianceAggregator::default();
        let mut summary = ComplianceSummary::new();
        aggregator.aggregate(&mut summary, PartnerId(1), CountryId(99), None, &[]);
        let country = summary.country(PartnerId(1), CountryId(99)).unwrap();
        assert!(country.country.is_empty());
        assert!(country.categories.is_empty());
    }

    proptest! {
        #[test]
        fn category_list_grows_by_one_per_aggregation(runs in prop::collection::vec(0usize..10, 1..20)) {
            let aggregator = ComplianceAggregator::default();
            let mut summary = ComplianceSummary::new();
            for (i, count) in runs.iter().enumerate() {
                aggregator.aggregate(
                    &mut summary,
                    PartnerId(1),
                    CountryId(58),
                    Some("tha"),
                    &counts(&[("protected_forest", *count)]),
                );
                let country = summary.country(PartnerId(1), CountryId(58)).unwrap();
                prop_assert_eq!(country.counts("protected_forest").unwrap().len(), i + 1);
                prop_assert_eq!(&country.counts("protected_forest").unwrap()[..=i], &runs[..=i]);
                prop_assert_eq!(country.country.len(), 1);
            }
        }
    }
}
