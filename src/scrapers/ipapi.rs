//! ipapi.com demo widget extractor.
//!
//! The lookup widget fills cells marked `data-demo-fill="<name>"`. Location
//! cells are visible first; the `connection` tab holds ISP and ASN.

use super::{Action, SourceDescriptor};
use crate::error::ExtractError;
use crate::models::{Field, RawFields};
use crate::normalize::Rule;
use crate::parsing::{element_text, non_empty, optional};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static FILL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-demo-fill]").unwrap());

const ROOT: &str = "[data-demo-fill]";

/// Widget cell name → raw key.
const CELLS: [(&str, &str); 9] = [
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("country", "country"),
    ("country_code", "country_code"),
    ("region", "region"),
    ("city", "city"),
    ("zip", "zip"),
    ("isp", "isp"),
    ("asn", "asn"),
];

pub const SOURCE: SourceDescriptor = SourceDescriptor {
    name: "ipapi.com",
    endpoint: "https://ipapi.com/?ip={ip}",
    ready: &[r#"[data-demo-fill="latitude"]"#],
    actions: &[
        Action::Click(r#"[data-demo-switch="connection"]"#),
        Action::WaitFor(r#"[data-demo-fill="ip"]"#),
    ],
    extract,
    fields: &[
        ("latitude", Rule::Float(Field::Latitude)),
        ("longitude", Rule::Float(Field::Longitude)),
        ("country", Rule::Text(Field::Country)),
        ("country_code", Rule::Text(Field::CountryCode)),
        ("region", Rule::Text(Field::Region)),
        ("city", Rule::Text(Field::City)),
        ("zip", Rule::Text(Field::ZipCode)),
        ("isp", Rule::Text(Field::Isp)),
        ("asn", Rule::Asn),
    ],
};

pub fn extract(document: &Html) -> Result<RawFields, ExtractError> {
    let mut cells = document.select(&FILL_SELECTOR).peekable();
    if cells.peek().is_none() {
        return Err(ExtractError::MissingRoot(ROOT));
    }

    let mut fields = RawFields::new();
    for cell in cells {
        let Some(name) = cell.value().attr("data-demo-fill") else {
            continue;
        };
        let Some((_, key)) = CELLS.iter().find(|(fill, _)| *fill == name) else {
            continue;
        };
        if fields.contains_key(key) {
            continue;
        }
        fields.insert_opt(*key, optional(key, || non_empty(element_text(cell))));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
      <div class="demo">
        <a data-demo-switch="location">Location</a>
        <a data-demo-switch="connection">Connection</a>
        <div class="tab">
          <span data-demo-fill="ip">8.8.8.8</span>
          <span data-demo-fill="latitude"> 37.751 </span>
          <span data-demo-fill="longitude">-97.822</span>
          <span data-demo-fill="country">United States</span>
          <span data-demo-fill="city">
          </span>
          <span data-demo-fill="zip">67051</span>
        </div>
        <div class="tab">
          <span data-demo-fill="isp">Google LLC</span>
          <span data-demo-fill="asn">15169</span>
          <span data-demo-fill="currency">USD</span>
        </div>
      </div>
    </body></html>"#;

    #[test]
    fn test_extracts_location_and_connection_cells() {
        let fields = extract(&Html::parse_document(PAGE)).unwrap();
        assert_eq!(fields.get("latitude"), Some("37.751"));
        assert_eq!(fields.get("longitude"), Some("-97.822"));
        assert_eq!(fields.get("country"), Some("United States"));
        assert_eq!(fields.get("zip"), Some("67051"));
        assert_eq!(fields.get("isp"), Some("Google LLC"));
        assert_eq!(fields.get("asn"), Some("15169"));
    }

    #[test]
    fn test_empty_and_unknown_cells_are_skipped() {
        let fields = extract(&Html::parse_document(PAGE)).unwrap();
        assert!(!fields.contains_key("city"));
        assert!(!fields.contains_key("currency"));
        assert!(!fields.contains_key("ip"));
    }

    #[test]
    fn test_missing_widget_is_extractor_failure() {
        let err = extract(&Html::parse_document("<html><p>blocked</p></html>")).unwrap_err();
        assert_eq!(err, ExtractError::MissingRoot(ROOT));
    }

    #[test]
    fn test_normalized_record() {
        let fields = extract(&Html::parse_document(PAGE)).unwrap();
        let record = SOURCE.normalize(&fields, "8.8.8.8");
        assert_eq!(record.source, "ipapi.com");
        assert_eq!(record.latitude, Some(37.751));
        assert_eq!(record.longitude, Some(-97.822));
        assert_eq!(record.zip_code.as_deref(), Some("67051"));
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.asn_organization, None);
        assert_eq!(record.city, None);
    }
}
