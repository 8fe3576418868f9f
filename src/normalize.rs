//! Raw field map → [`UnifiedRecord`].
//!
//! Each source declares a [`FieldTable`]: an ordered list of
//! `(raw key, rule)` pairs naming the canonical field a raw key feeds and the
//! coercion applied on the way. The normalizer itself is source-agnostic;
//! adding a source is a data change.
//!
//! # Rules
//!
//! - Table order is preference order: a field already set by an earlier row
//!   is never overwritten by a later one.
//! - Raw keys absent from the table are dropped silently.
//! - A value that fails its coercion leaves the field absent.
//! - `latitude`/`longitude` survive only as a pair.

use crate::models::{Field, FieldValue, RawFields, UnifiedRecord};
use crate::parsing::{
    first_line, optional, parse_coordinates, parse_count, parse_float, split_asn, text_flag,
};
use tracing::debug;

/// How one raw value becomes canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Trimmed text.
    Text(Field),
    /// Trimmed, lower-cased text.
    Lower(Field),
    /// First non-blank line of the text.
    FirstLine(Field),
    Float(Field),
    /// Comma-grouped non-negative integer.
    Count(Field),
    /// `true` iff the text contains `true`, any case.
    Flag(Field),
    /// `"<number> - <org>"` into `asn` and `asn_organization`.
    Asn,
    /// `"lat, lon"` into `latitude` and `longitude`.
    Coordinates,
}

pub type FieldTable = &'static [(&'static str, Rule)];

/// Normalize one source's raw map.
///
/// # Arguments
///
/// * `source` - Source name stamped on the record
/// * `table` - The source's `(raw key, rule)` table, in preference order
/// * `raw` - What the extractor produced
/// * `ip` - The queried address
///
/// # Returns
///
/// A [`UnifiedRecord`]. A raw map carrying an `error` key short-circuits to
/// a failed record; every other key is ignored in that case.
pub fn normalize(source: &str, table: FieldTable, raw: &RawFields, ip: &str) -> UnifiedRecord {
    if let Some(error) = raw.error() {
        return UnifiedRecord::failed(ip, source, error);
    }

    let mut record = UnifiedRecord::new(ip, source);
    for (key, rule) in table {
        if let Some(value) = raw.get(key) {
            apply(&mut record, *rule, key, value);
        }
    }

    let ignored = raw
        .iter()
        .filter(|(key, _)| !table.iter().any(|(known, _)| known == key))
        .count();
    if ignored > 0 {
        debug!(source, ignored, "Dropped unmapped raw keys");
    }

    if record.latitude.is_some() != record.longitude.is_some() {
        debug!(source, "Dropping unpaired coordinate");
        record.latitude = None;
        record.longitude = None;
    }

    record
}

fn apply(record: &mut UnifiedRecord, rule: Rule, key: &str, value: &str) {
    match rule {
        Rule::Text(field) => fill(record, field, Some(FieldValue::Text(value.trim().to_string()))),
        Rule::Lower(field) => fill(record, field, Some(FieldValue::Text(value.trim().to_lowercase()))),
        Rule::FirstLine(field) => {
            let line = first_line(value);
            if !line.is_empty() {
                fill(record, field, Some(FieldValue::Text(line.to_string())));
            }
        }
        Rule::Float(field) => fill(
            record,
            field,
            optional(key, || parse_float(value)).map(FieldValue::Float),
        ),
        Rule::Count(field) => fill(
            record,
            field,
            optional(key, || parse_count(value)).map(FieldValue::Count),
        ),
        Rule::Flag(field) => fill(record, field, Some(FieldValue::Flag(text_flag(value)))),
        Rule::Asn => {
            let (number, organization) = split_asn(value);
            if !number.is_empty() {
                fill(record, Field::Asn, Some(FieldValue::Text(number)));
            }
            fill(record, Field::AsnOrganization, organization.map(FieldValue::Text));
        }
        Rule::Coordinates => {
            if record.latitude.is_some() || record.longitude.is_some() {
                return;
            }
            if let Some((lat, lon)) = optional(key, || parse_coordinates(value)) {
                record.latitude = Some(lat);
                record.longitude = Some(lon);
            }
        }
    }
}

fn fill(record: &mut UnifiedRecord, field: Field, value: Option<FieldValue>) {
    let Some(value) = value else { return };
    if record.get(field).is_some() {
        return;
    }
    if !record.set(field, value) {
        debug!(field = %field, "Rule targets a field of another kind");
    }
}
