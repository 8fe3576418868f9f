//! Cross-source agreement analysis.
//!
//! For each compared field the analyzer collects what every source reported,
//! ignoring absent values and "no data" placeholders, and checks whether all
//! reporting sources agree. A field reported by zero or one source is
//! trivially consistent.

use crate::models::{Field, FieldValue, UnifiedRecord};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Placeholders some sources print instead of leaving a cell empty.
const NO_DATA: [&str; 2] = ["", "n/a"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConsistency {
    pub unique_values: usize,
    pub values: BTreeMap<String, FieldValue>,
    pub is_consistent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsistencySummary {
    /// Every source consulted, failed ones included.
    pub total_sources: usize,
    pub consistent_fields: usize,
    pub total_fields: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub ip_address: String,
    pub comparison: BTreeMap<Field, BTreeMap<String, FieldValue>>,
    pub consistency: BTreeMap<Field, FieldConsistency>,
    pub summary: ConsistencySummary,
}

impl ConsistencyReport {
    pub fn is_consistent(&self, field: Field) -> Option<bool> {
        self.consistency.get(&field).map(|c| c.is_consistent)
    }
}

fn is_no_data(value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(s) => NO_DATA.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

/// Compare `fields` across `records`.
///
/// # Arguments
///
/// * `ip_address` - Echoed into the report
/// * `records` - Every source record, failed ones included
/// * `fields` - Fields to compare; duplicates are compared once
///
/// # Returns
///
/// A [`ConsistencyReport`] with each field's reported values, its distinct
/// value count and whether the reporting sources agree.
pub fn analyze(ip_address: &str, records: &[UnifiedRecord], fields: &[Field]) -> ConsistencyReport {
    let mut comparison = BTreeMap::new();
    let mut consistency = BTreeMap::new();

    for field in fields.iter().copied().unique() {
        let values: BTreeMap<String, FieldValue> = records
            .iter()
            .filter_map(|r| {
                r.get(field)
                    .filter(|v| !is_no_data(v))
                    .map(|v| (r.source.clone(), v))
            })
            .collect();

        let unique_values = values.values().map(FieldValue::to_string).unique().count();
        debug!(%field, reporting = values.len(), unique_values, "Compared field");

        comparison.insert(field, values.clone());
        consistency.insert(
            field,
            FieldConsistency {
                unique_values,
                values,
                is_consistent: unique_values <= 1,
            },
        );
    }

    let summary = ConsistencySummary {
        total_sources: records.len(),
        consistent_fields: consistency.values().filter(|c| c.is_consistent).count(),
        total_fields: consistency.len(),
    };

    ConsistencyReport {
        ip_address: ip_address.to_string(),
        comparison,
        consistency,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_country(source: &str, country: &str) -> UnifiedRecord {
        UnifiedRecord {
            country: Some(country.into()),
            ..UnifiedRecord::new("8.8.8.8", source)
        }
    }

    #[test]
    fn test_disagreement_is_inconsistent() {
        let records = [
            with_country("a", "US"),
            with_country("b", "US"),
            with_country("c", "CA"),
        ];
        let report = analyze("8.8.8.8", &records, &[Field::Country]);
        let country = &report.consistency[&Field::Country];
        assert_eq!(country.unique_values, 2);
        assert!(!country.is_consistent);
        assert_eq!(report.summary.consistent_fields, 0);
    }

    #[test]
    fn test_agreement_is_consistent() {
        let records = [
            with_country("a", "US"),
            with_country("b", "US"),
            with_country("c", "US"),
        ];
        let report = analyze("8.8.8.8", &records, &[Field::Country]);
        assert_eq!(report.consistency[&Field::Country].unique_values, 1);
        assert_eq!(report.is_consistent(Field::Country), Some(true));
    }

    #[test]
    fn test_unreported_and_single_fields_are_trivially_consistent() {
        let records = [with_country("a", "US"), UnifiedRecord::new("8.8.8.8", "b")];
        let report = analyze("8.8.8.8", &records, &[Field::Country, Field::City]);
        assert_eq!(report.consistency[&Field::City].unique_values, 0);
        assert!(report.consistency[&Field::City].is_consistent);
        assert!(report.consistency[&Field::Country].is_consistent);
        assert_eq!(report.summary.consistent_fields, 2);
        assert_eq!(report.summary.total_fields, 2);
    }

    #[test]
    fn test_no_data_placeholders_are_ignored() {
        let records = [
            with_country("a", "US"),
            with_country("b", "N/A"),
            with_country("c", "  "),
        ];
        let report = analyze("8.8.8.8", &records, &[Field::Country]);
        assert_eq!(report.comparison[&Field::Country].len(), 1);
        assert!(report.consistency[&Field::Country].is_consistent);
    }

    #[test]
    fn test_failed_sources_count_toward_total() {
        let records = [
            UnifiedRecord::failed("8.8.8.8", "a", "timeout"),
            with_country("b", "US"),
        ];
        let report = analyze("8.8.8.8", &records, &Field::DEFAULT_COMPARISON);
        assert_eq!(report.summary.total_sources, 2);
        assert_eq!(report.summary.total_fields, 5);
        assert_eq!(report.comparison[&Field::Country].len(), 1);
    }

    #[test]
    fn test_numeric_fields_compare_by_value() {
        let at = |source: &str, lat: f64| UnifiedRecord {
            latitude: Some(lat),
            longitude: Some(-97.822),
            ..UnifiedRecord::new("8.8.8.8", source)
        };
        let report = analyze(
            "8.8.8.8",
            &[at("a", 37.751), at("b", 37.751), at("c", 37.7)],
            &[Field::Latitude, Field::Longitude],
        );
        assert_eq!(report.consistency[&Field::Latitude].unique_values, 2);
        assert!(report.consistency[&Field::Longitude].is_consistent);
    }

    #[test]
    fn test_payload_shape() {
        let report = analyze("8.8.8.8", &[with_country("a", "US")], &[Field::Country]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ip_address"], "8.8.8.8");
        assert_eq!(json["comparison"]["country"]["a"], "US");
        assert_eq!(json["consistency"]["country"]["unique_values"], 1);
        assert_eq!(json["consistency"]["country"]["values"]["a"], "US");
        assert_eq!(json["consistency"]["country"]["is_consistent"], true);
        assert_eq!(json["summary"]["total_sources"], 1);
        assert_eq!(json["summary"]["consistent_fields"], 1);
        assert_eq!(json["summary"]["total_fields"], 1);
    }
}
