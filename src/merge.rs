//! Merging per-source records into one combined record.
//!
//! Precedence is positional: callers pass records in priority order and, for
//! every field, the first record holding a value wins. Failed records never
//! contribute fields. Tri-state booleans take the first *known* value, so an
//! explicit `false` from a higher-priority source beats a later `true`.
//! Coordinates are taken as a pair from a single record.

use crate::models::{COMBINED_SOURCE, Field, UnifiedRecord};

/// Combine `records` into a record whose source is `"combined"`.
///
/// # Arguments
///
/// * `records` - Per-source records, highest priority first
/// * `queried_ip` - Address used when no record carries one
///
/// # Returns
///
/// The combined record. Values are copied as given: a blank text value is
/// skipped while a later record has real text, but is kept when nothing
/// better exists, so merging a single record only changes its source
/// (a latitude without a longitude, or the reverse, is still dropped).
///
/// Never fails: with no usable input the result carries only the address
/// and the first input error, if any.
pub fn merge(records: &[UnifiedRecord], queried_ip: &str) -> UnifiedRecord {
    let ip_address = records
        .iter()
        .map(|r| r.ip_address.as_str())
        .find(|ip| !ip.trim().is_empty())
        .unwrap_or(queried_ip);

    let mut combined = UnifiedRecord::new(ip_address, COMBINED_SOURCE);
    let errors = || records.iter().filter_map(|r| r.error.as_deref());
    combined.error = errors()
        .find(|e| !e.trim().is_empty())
        .or_else(|| errors().next())
        .map(str::to_string);

    let usable: Vec<&UnifiedRecord> = records.iter().filter(|r| !r.is_failed()).collect();

    for field in Field::ALL {
        if field.is_coordinate() {
            continue;
        }
        let value = usable
            .iter()
            .find_map(|r| if r.has(field) { r.get(field) } else { None })
            .or_else(|| usable.iter().find_map(|r| r.get(field)));
        if let Some(value) = value {
            combined.set(field, value);
        }
    }

    if let Some(located) = usable
        .iter()
        .find(|r| r.latitude.is_some() && r.longitude.is_some())
    {
        combined.latitude = located.latitude;
        combined.longitude = located.longitude;
    }

    combined
}
