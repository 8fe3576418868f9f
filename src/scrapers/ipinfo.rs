//! ipinfo.io summary table extractor.
//!
//! The page lists one attribute per `tbody` row: label in the first cell,
//! value in the last. Labels are keyed as lower-case, underscore-joined
//! text (`"Hosted domains"` → `hosted_domains`). Two rows get special
//! handling at extraction time: `ASN` is split into number and organization,
//! and `Abuse contact` yields the address behind its `mailto:` link.

use super::SourceDescriptor;
use crate::error::ExtractError;
use crate::models::{Field, RawFields};
use crate::normalize::Rule;
use crate::parsing::{FieldMiss, element_text, first_line, label_key, non_empty, optional, split_asn};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static MAILTO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="mailto:"]"#).unwrap());

const ROOT: &str = "tbody tr";

/// Rows whose value cell may carry a flag or label on a second line.
const GEOGRAPHY: [&str; 3] = ["city", "region", "country"];

pub const SOURCE: SourceDescriptor = SourceDescriptor {
    name: "ipinfo.io",
    endpoint: "https://ipinfo.io/{ip}",
    ready: &[ROOT],
    actions: &[],
    extract,
    fields: &[
        ("asn_number", Rule::Text(Field::Asn)),
        ("asn_organization", Rule::Text(Field::AsnOrganization)),
        ("asn", Rule::Asn),
        ("hostname", Rule::Text(Field::Hostname)),
        ("range", Rule::Text(Field::IpRange)),
        ("company", Rule::Text(Field::Company)),
        ("hosted_domains", Rule::Count(Field::HostedDomainsCount)),
        ("privacy", Rule::Flag(Field::IsPrivate)),
        ("anycast", Rule::Flag(Field::IsAnycast)),
        ("asn_type", Rule::Lower(Field::AsnType)),
        ("abuse_email", Rule::Text(Field::AbuseEmail)),
        ("country", Rule::FirstLine(Field::Country)),
        ("region", Rule::FirstLine(Field::Region)),
        ("city", Rule::FirstLine(Field::City)),
        ("postal", Rule::Text(Field::ZipCode)),
        ("timezone", Rule::Text(Field::Timezone)),
        ("coordinates", Rule::Coordinates),
    ],
};

pub fn extract(document: &Html) -> Result<RawFields, ExtractError> {
    let mut rows = document.select(&ROW_SELECTOR).peekable();
    if rows.peek().is_none() {
        return Err(ExtractError::MissingRoot(ROOT));
    }

    let mut fields = RawFields::new();
    for row in rows {
        if let Some(row_fields) = optional("ipinfo row", || read_row(row)) {
            fields.absorb(row_fields);
        }
    }
    Ok(fields)
}

fn read_row(row: ElementRef<'_>) -> Result<RawFields, FieldMiss> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SELECTOR).collect();
    let (label_cell, value_cell) = match cells.as_slice() {
        [first, .., last] => (*first, *last),
        _ => return Err(FieldMiss::Absent),
    };

    let key = label_key(&element_text(label_cell));
    if key.is_empty() {
        return Err(FieldMiss::Empty);
    }
    if key == "abuse_contact" {
        return abuse_contact(value_cell);
    }
    let value = non_empty(element_text(value_cell))?;

    let mut fields = RawFields::new();
    match key.as_str() {
        "asn" => match split_asn(&value) {
            (number, Some(organization)) => {
                fields.insert("asn_number", number);
                fields.insert("asn_organization", organization);
            }
            (number, None) => fields.insert("asn", number),
        },
        geo if GEOGRAPHY.contains(&geo) => fields.insert(key.clone(), first_line(&value)),
        _ => fields.insert(key.clone(), value),
    }
    Ok(fields)
}

/// `abuse_email` from the first `mailto:` link (its `href`, else its text),
/// otherwise the cell text as `abuse_contact`.
fn abuse_contact(cell: ElementRef<'_>) -> Result<RawFields, FieldMiss> {
    let email = cell.select(&MAILTO_SELECTOR).find_map(|link| {
        link.value()
            .attr("href")
            .and_then(mailto_address)
            .or_else(|| non_empty(element_text(link)).ok())
    });

    let mut fields = RawFields::new();
    match email {
        Some(email) => fields.insert("abuse_email", email),
        None => fields.insert("abuse_contact", non_empty(element_text(cell))?),
    }
    Ok(fields)
}

/// `"mailto:abuse%40example.net?subject=x"` → `"abuse@example.net"`.
fn mailto_address(href: &str) -> Option<String> {
    let address = href.strip_prefix("mailto:")?;
    let address = address.split('?').next().unwrap_or(address).trim();
    let decoded = urlencoding::decode(address)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| address.to_string());
    non_empty(decoded).ok()
}
