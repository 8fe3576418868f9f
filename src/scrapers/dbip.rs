//! db-ip.com result page extractor.
//!
//! The page renders three `.menu.results.shadow` blocks: network details,
//! threat assessment and geography. Rows are `th`/`td` pairs. When the geo
//! table has no coordinates, the OpenStreetMap iframe's `marker=lat,lon`
//! parameter is used instead.

use super::SourceDescriptor;
use crate::error::ExtractError;
use crate::models::{Field, RawFields};
use crate::normalize::Rule;
use crate::parsing::{
    FieldMiss, element_text, first_line, label_key, marker_coordinates, non_empty, optional,
    split_asn,
};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".menu.results.shadow").unwrap());
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table tr").unwrap());
static TH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
static TD_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static THREAT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".label.badge-success").unwrap());
static MAP_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"iframe[data-src*="openstreetmap"], iframe[src*="openstreetmap"]"#).unwrap()
});

const ROOT: &str = ".menu.results.shadow";

pub const SOURCE: SourceDescriptor = SourceDescriptor {
    name: "db-ip.com",
    endpoint: "https://db-ip.com/{ip}",
    ready: &[".menu.results.shadow table"],
    actions: &[],
    extract,
    fields: &[
        ("asn_number", Rule::Text(Field::Asn)),
        ("asn_organization", Rule::Text(Field::AsnOrganization)),
        ("asn", Rule::Asn),
        ("hostname", Rule::Text(Field::Hostname)),
        ("isp", Rule::Text(Field::Isp)),
        ("organization", Rule::Text(Field::Organization)),
        ("country", Rule::Text(Field::Country)),
        ("region", Rule::Text(Field::Region)),
        ("county", Rule::Text(Field::District)),
        ("city", Rule::Text(Field::City)),
        ("postal_code", Rule::Text(Field::ZipCode)),
        ("coordinates", Rule::Coordinates),
        ("timezone", Rule::Text(Field::Timezone)),
    ],
};

pub fn extract(document: &Html) -> Result<RawFields, ExtractError> {
    let blocks: Vec<ElementRef<'_>> = document.select(&BLOCK_SELECTOR).collect();
    let Some(network) = blocks.first() else {
        return Err(ExtractError::MissingRoot(ROOT));
    };

    let mut fields = RawFields::new();
    for (key, value) in rows(*network) {
        match key.as_str() {
            "asn" => match split_asn(&value) {
                (number, Some(organization)) => {
                    fields.insert("asn_number", number);
                    fields.insert("asn_organization", organization);
                }
                (number, None) => fields.insert("asn", number),
            },
            "hostname" | "isp" | "organization" => fields.insert(key.clone(), value),
            "connection" => fields.insert("connection_type", value),
            "address_type" => fields.insert("ip_version", value),
            _ => {}
        }
    }

    fields.insert_opt(
        "threat_level",
        optional("threat_level", || {
            let badge = document.select(&THREAT_SELECTOR).next().ok_or(FieldMiss::Absent)?;
            non_empty(element_text(badge))
        }),
    );

    if let Some(geo) = blocks.get(2) {
        for (key, value) in rows(*geo) {
            match key.as_str() {
                "country" | "city" => fields.insert(key.clone(), first_line(&value)),
                "state_/_region" => fields.insert("region", first_line(&value)),
                "district_/_county" => fields.insert("county", first_line(&value)),
                "zip_/_postal_code" => fields.insert("postal_code", value),
                "timezone" => fields.insert("timezone", before_paren(&value)),
                "coordinates" | "local_time" | "languages" | "currency" | "weather_station" => {
                    fields.insert(key.clone(), value)
                }
                _ => {}
            }
        }
    }

    if !fields.contains_key("coordinates") {
        let from_map = optional("coordinates", || {
            let frame = document.select(&MAP_SELECTOR).next().ok_or(FieldMiss::Absent)?;
            let src = frame
                .value()
                .attr("data-src")
                .or_else(|| frame.value().attr("src"))
                .ok_or(FieldMiss::Absent)?;
            marker_coordinates(src)
        });
        if let Some((lat, lon)) = from_map {
            fields.insert("coordinates", format!("{lat}, {lon}"));
        }
    }

    Ok(fields)
}

/// `(key, raw cell text)` for every `th`/`td` row of a block. Cell text
/// keeps its inner newlines so geography cells can drop their second line.
fn rows(block: ElementRef<'_>) -> Vec<(String, String)> {
    block
        .select(&ROW_SELECTOR)
        .filter_map(|row| {
            optional("db-ip row", || {
                let th = row.select(&TH_SELECTOR).next().ok_or(FieldMiss::Absent)?;
                let td = row.select(&TD_SELECTOR).next().ok_or(FieldMiss::Absent)?;
                let key = label_key(&element_text(th));
                let value = non_empty(element_text(td))?;
                Ok((key, value))
            })
        })
        .collect()
}

/// `"America/Chicago (UTC-5)"` → `"America/Chicago"`.
fn before_paren(text: &str) -> &str {
    text.split('(').next().unwrap_or(text).trim()
}
