//! Field-level parsing helpers shared by extractors and normalizers.
//!
//! Scraped cells are free text, so every conversion here can miss. A miss is
//! reported as a [`FieldMiss`] and turned into absence by [`optional`], which
//! is the single place where per-field failures are swallowed. Nothing in
//! this module panics on malformed input.

use scraper::ElementRef;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Why a single field produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldMiss {
    #[error("element not present")]
    Absent,

    #[error("element has no text")]
    Empty,

    #[error("cannot parse `{0}`")]
    Malformed(String),
}

/// Run one field extraction; any miss yields `None` and is logged at debug.
pub fn optional<T>(field: &str, attempt: impl FnOnce() -> Result<T, FieldMiss>) -> Option<T> {
    match attempt() {
        Ok(value) => Some(value),
        Err(miss) => {
            debug!(field, reason = %miss, "Optional field skipped");
            None
        }
    }
}

/// Whitespace-trimmed text of an element, with non-breaking spaces folded.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

pub fn clean_text(text: &str) -> String {
    text.replace('\u{a0}', " ").trim().to_string()
}

/// First non-blank line of a cell.
///
/// Geography cells often carry a flag or a translated label on a second line.
pub fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

pub fn non_empty(text: String) -> Result<String, FieldMiss> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(FieldMiss::Empty)
    } else if trimmed.len() == text.len() {
        Ok(text)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Lower-cased, underscore-joined row label: `"Hosted domains"` → `"hosted_domains"`.
pub fn label_key(label: &str) -> String {
    clean_text(label)
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Split an ASN cell of the form `"<number> - <org name>"` on the first
/// `" - "`. Without a separator the whole text is the ASN and there is no
/// organization.
pub fn split_asn(text: &str) -> (String, Option<String>) {
    let text = text.trim();
    match text.split_once(" - ") {
        Some((number, org)) => {
            let org = org.trim();
            (
                number.trim().to_string(),
                (!org.is_empty()).then(|| org.to_string()),
            )
        }
        None => (text.to_string(), None),
    }
}

pub fn parse_float(text: &str) -> Result<f64, FieldMiss> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FieldMiss::Malformed(trimmed.to_string())),
    }
}

/// Parse a comma-grouped, non-negative integer such as `"12,345"`.
pub fn parse_count(text: &str) -> Result<u64, FieldMiss> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    digits
        .parse::<u64>()
        .map_err(|_| FieldMiss::Malformed(text.trim().to_string()))
}

/// Parse a composite `"lat, lon"` string. Both halves must parse, or
/// neither is returned.
pub fn parse_coordinates(text: &str) -> Result<(f64, f64), FieldMiss> {
    let mut parts = text.split(',');
    match (parts.next(), parts.next()) {
        (Some(lat), Some(lon)) => Ok((parse_float(lat)?, parse_float(lon)?)),
        _ => Err(FieldMiss::Malformed(text.trim().to_string())),
    }
}

/// Boolean-as-text: true iff `true` appears anywhere, ignoring case.
///
/// Absence of the token reads as `false`, so a rephrased cell turns into a
/// false negative rather than a miss.
pub fn text_flag(text: &str) -> bool {
    text.to_lowercase().contains("true")
}

/// Coordinates from a map widget URL carrying `marker=lat,lon`.
///
/// Accepts absolute and protocol-relative URLs.
pub fn marker_coordinates(src: &str) -> Result<(f64, f64), FieldMiss> {
    let base = Url::parse("https://localhost/").map_err(|e| FieldMiss::Malformed(e.to_string()))?;
    let url = base
        .join(src.trim())
        .map_err(|_| FieldMiss::Malformed(src.trim().to_string()))?;
    let marker = url
        .query_pairs()
        .find(|(key, _)| key == "marker")
        .map(|(_, value)| value.into_owned())
        .ok_or(FieldMiss::Absent)?;
    parse_coordinates(&marker)
}
