//! whatismyipaddress.com lookup page extractor.
//!
//! Details are rendered as `Label: value` lines inside the cards of
//! `#section_left_3rd`. Only innermost `div`s are read so a wrapper's
//! concatenated text never shadows the real lines.

use super::SourceDescriptor;
use crate::error::ExtractError;
use crate::models::{Field, RawFields};
use crate::normalize::Rule;
use crate::parsing::{FieldMiss, element_text, label_key, non_empty, optional};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static SECTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#section_left_3rd").unwrap());
static DETAIL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#section_left_3rd .card div").unwrap());

const ROOT: &str = "#section_left_3rd";

pub const SOURCE: SourceDescriptor = SourceDescriptor {
    name: "whatismyipaddress.com",
    endpoint: "https://whatismyipaddress.com/ip/{ip}",
    ready: &[ROOT],
    actions: &[],
    extract,
    fields: &[
        ("hostname", Rule::Text(Field::Hostname)),
        ("asn", Rule::Asn),
        ("isp", Rule::Text(Field::Isp)),
        ("organization", Rule::Text(Field::Organization)),
        ("country", Rule::FirstLine(Field::Country)),
        ("state/region", Rule::FirstLine(Field::Region)),
        ("city", Rule::FirstLine(Field::City)),
        ("postal_code", Rule::Text(Field::ZipCode)),
        ("latitude", Rule::Float(Field::Latitude)),
        ("longitude", Rule::Float(Field::Longitude)),
    ],
};

pub fn extract(document: &Html) -> Result<RawFields, ExtractError> {
    if document.select(&SECTION_SELECTOR).next().is_none() {
        return Err(ExtractError::MissingRoot(ROOT));
    }

    let mut fields = RawFields::new();
    for detail in document.select(&DETAIL_SELECTOR) {
        if has_nested_div(detail) {
            continue;
        }
        if let Some((key, value)) = optional("whatismyipaddress detail", || read_detail(detail)) {
            if !fields.contains_key(&key) {
                fields.insert(key, value);
            }
        }
    }
    Ok(fields)
}

fn has_nested_div(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "div")
}

fn read_detail(detail: ElementRef<'_>) -> Result<(String, String), FieldMiss> {
    let text = element_text(detail);
    let (label, value) = text.split_once(':').ok_or(FieldMiss::Absent)?;
    let key = label_key(label);
    if key.is_empty() {
        return Err(FieldMiss::Empty);
    }
    let value = match key.as_str() {
        // "37.751 (37° 45′ 3.60″ N)"
        "latitude" | "longitude" => value.split('(').next().unwrap_or(value),
        _ => value,
    };
    Ok((key, non_empty(value.to_string())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><div id="section_left_3rd">
      <div class="card">
        <div class="inner">
          <div><span>Hostname:</span> dns.google</div>
          <div><span>ASN:</span> 15169</div>
          <div><span>ISP:</span> Google LLC</div>
          <div><span>Services:</span> Datacenter</div>
          <div>No colon here</div>
        </div>
      </div>
      <div class="card">
        <div><span>Country:</span> United States</div>
        <div><span>State/Region:</span> Kansas</div>
        <div><span>City:</span> </div>
        <div><span>Latitude:</span> 37.751 (37° 45′ 3.60″ N)</div>
        <div><span>Longitude:</span> -97.822 (97° 49′ 19.20″ W)</div>
      </div>
    </div></body></html>"#;

    #[test]
    fn test_reads_innermost_label_lines() {
        let fields = extract(&Html::parse_document(PAGE)).unwrap();
        assert_eq!(fields.get("hostname"), Some("dns.google"));
        assert_eq!(fields.get("asn"), Some("15169"));
        assert_eq!(fields.get("isp"), Some("Google LLC"));
        assert_eq!(fields.get("state/region"), Some("Kansas"));
        assert!(!fields.contains_key("city"));
    }

    #[test]
    fn test_coordinates_drop_dms_suffix() {
        let fields = extract(&Html::parse_document(PAGE)).unwrap();
        assert_eq!(fields.get("latitude"), Some("37.751"));
        assert_eq!(fields.get("longitude"), Some("-97.822"));
    }

    #[test]
    fn test_missing_section_is_extractor_failure() {
        let err = extract(&Html::parse_document("<html></html>")).unwrap_err();
        assert_eq!(err, ExtractError::MissingRoot(ROOT));
    }

    #[test]
    fn test_normalized_record() {
        let fields = extract(&Html::parse_document(PAGE)).unwrap();
        let record = SOURCE.normalize(&fields, "8.8.8.8");
        assert_eq!(record.region.as_deref(), Some("Kansas"));
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.latitude, Some(37.751));
        assert_eq!(record.longitude, Some(-97.822));
        assert_eq!(record.city, None);
    }
}
