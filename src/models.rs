//! Data models shared by every source.
//!
//! - [`RawFields`]: the untyped key/value map a source extractor emits
//! - [`UnifiedRecord`]: the canonical schema every source is normalized into
//! - [`Field`] / [`FieldValue`]: field-level addressing used by merge and
//!   consistency analysis, so neither has to know the struct layout
//! - [`UnifiedReport`]: the per-source view plus the combined record
//!
//! Serialized records omit `None` fields; `ip_address` and `source` are
//! always present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Source name carried by merged records.
pub const COMBINED_SOURCE: &str = "combined";

/// Every optional field of a [`UnifiedRecord`], in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Country,
    CountryCode,
    Region,
    City,
    District,
    ZipCode,
    Latitude,
    Longitude,
    Isp,
    Organization,
    Asn,
    AsnOrganization,
    AsnType,
    Company,
    Hostname,
    IpRange,
    AbuseEmail,
    Timezone,
    HostedDomainsCount,
    IsPrivate,
    IsAnycast,
}

impl Field {
    pub const ALL: [Field; 21] = [
        Field::Country,
        Field::CountryCode,
        Field::Region,
        Field::City,
        Field::District,
        Field::ZipCode,
        Field::Latitude,
        Field::Longitude,
        Field::Isp,
        Field::Organization,
        Field::Asn,
        Field::AsnOrganization,
        Field::AsnType,
        Field::Company,
        Field::Hostname,
        Field::IpRange,
        Field::AbuseEmail,
        Field::Timezone,
        Field::HostedDomainsCount,
        Field::IsPrivate,
        Field::IsAnycast,
    ];

    /// Fields compared by default when checking cross-source agreement.
    pub const DEFAULT_COMPARISON: [Field; 5] = [
        Field::Country,
        Field::City,
        Field::Isp,
        Field::Latitude,
        Field::Longitude,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Country => "country",
            Field::CountryCode => "country_code",
            Field::Region => "region",
            Field::City => "city",
            Field::District => "district",
            Field::ZipCode => "zip_code",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Isp => "isp",
            Field::Organization => "organization",
            Field::Asn => "asn",
            Field::AsnOrganization => "asn_organization",
            Field::AsnType => "asn_type",
            Field::Company => "company",
            Field::Hostname => "hostname",
            Field::IpRange => "ip_range",
            Field::AbuseEmail => "abuse_email",
            Field::Timezone => "timezone",
            Field::HostedDomainsCount => "hosted_domains_count",
            Field::IsPrivate => "is_private",
            Field::IsAnycast => "is_anycast",
        }
    }

    /// Tri-state booleans merge by "first known value", not "first non-empty".
    pub fn is_tri_state(self) -> bool {
        matches!(self, Field::IsPrivate | Field::IsAnycast)
    }

    pub fn is_coordinate(self) -> bool {
        matches!(self, Field::Latitude | Field::Longitude)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Count(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Count(v) => write!(f, "{v}"),
            FieldValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

/// The canonical record every source is normalized into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    /// The queried address; present whatever the fetch outcome.
    pub ip_address: String,
    /// The origin of the record, e.g. `"ipinfo.io"` or `"combined"`.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    /// Always paired with `longitude`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Always paired with `latitude`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn_organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abuse_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_domains_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_anycast: Option<bool>,
    /// Set only on failed source records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnifiedRecord {
    pub fn new(ip_address: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// A failed source record: only the address, source and error are set.
    pub fn failed(
        ip_address: impl Into<String>,
        source: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(ip_address, source)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn text(&self, field: Field) -> Option<&Option<String>> {
        let slot = match field {
            Field::Country => &self.country,
            Field::CountryCode => &self.country_code,
            Field::Region => &self.region,
            Field::City => &self.city,
            Field::District => &self.district,
            Field::ZipCode => &self.zip_code,
            Field::Isp => &self.isp,
            Field::Organization => &self.organization,
            Field::Asn => &self.asn,
            Field::AsnOrganization => &self.asn_organization,
            Field::AsnType => &self.asn_type,
            Field::Company => &self.company,
            Field::Hostname => &self.hostname,
            Field::IpRange => &self.ip_range,
            Field::AbuseEmail => &self.abuse_email,
            Field::Timezone => &self.timezone,
            _ => return None,
        };
        Some(slot)
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        let slot = match field {
            Field::Country => &mut self.country,
            Field::CountryCode => &mut self.country_code,
            Field::Region => &mut self.region,
            Field::City => &mut self.city,
            Field::District => &mut self.district,
            Field::ZipCode => &mut self.zip_code,
            Field::Isp => &mut self.isp,
            Field::Organization => &mut self.organization,
            Field::Asn => &mut self.asn,
            Field::AsnOrganization => &mut self.asn_organization,
            Field::AsnType => &mut self.asn_type,
            Field::Company => &mut self.company,
            Field::Hostname => &mut self.hostname,
            Field::IpRange => &mut self.ip_range,
            Field::AbuseEmail => &mut self.abuse_email,
            Field::Timezone => &mut self.timezone,
            _ => return None,
        };
        Some(slot)
    }

    /// Read a field as a typed value.
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Latitude => self.latitude.map(FieldValue::Float),
            Field::Longitude => self.longitude.map(FieldValue::Float),
            Field::HostedDomainsCount => self.hosted_domains_count.map(FieldValue::Count),
            Field::IsPrivate => self.is_private.map(FieldValue::Flag),
            Field::IsAnycast => self.is_anycast.map(FieldValue::Flag),
            text => self
                .text(text)
                .and_then(|slot| slot.clone())
                .map(FieldValue::Text),
        }
    }

    /// Write a field. Returns `false` and leaves the record untouched when
    /// the value kind does not fit the field.
    pub fn set(&mut self, field: Field, value: FieldValue) -> bool {
        match (field, value) {
            (Field::Latitude, FieldValue::Float(v)) => self.latitude = Some(v),
            (Field::Longitude, FieldValue::Float(v)) => self.longitude = Some(v),
            (Field::HostedDomainsCount, FieldValue::Count(v)) => {
                self.hosted_domains_count = Some(v)
            }
            (Field::IsPrivate, FieldValue::Flag(v)) => self.is_private = Some(v),
            (Field::IsAnycast, FieldValue::Flag(v)) => self.is_anycast = Some(v),
            (field, FieldValue::Text(s)) => match self.text_mut(field) {
                Some(slot) => *slot = Some(s),
                None => return false,
            },
            _ => return false,
        }
        true
    }

    /// `true` when the field holds something worth merging: any number or
    /// flag, or a string that is not blank.
    pub fn has(&self, field: Field) -> bool {
        match self.get(field) {
            Some(FieldValue::Text(s)) => !s.trim().is_empty(),
            Some(_) => true,
            None => false,
        }
    }
}

/// Key/value pairs emitted by a source extractor, before normalization.
///
/// Values are trimmed on insert and empty values are dropped, so a present
/// key always carries text. The reserved `error` key marks a failed source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawFields(BTreeMap<String, String>);

impl RawFields {
    pub const ERROR_KEY: &'static str = "error";

    pub fn new() -> Self {
        Self::default()
    }

    /// A raw map describing a failed fetch; carries nothing but the error.
    pub fn failed(error: impl fmt::Display) -> Self {
        let mut fields = Self::new();
        fields
            .0
            .insert(Self::ERROR_KEY.to_string(), error.to_string());
        fields
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.0.insert(key.into(), value.to_string());
        }
    }

    /// Insert the value when an optional extraction produced one.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<String>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn error(&self) -> Option<&str> {
        self.get(Self::ERROR_KEY)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge another map in; keys already present keep their value.
    pub fn absorb(&mut self, other: RawFields) {
        for (key, value) in other.0 {
            self.0.entry(key).or_insert(value);
        }
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for RawFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = RawFields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Output payload of one aggregation run: every source's record plus the
/// merged one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedReport {
    pub sources: BTreeMap<String, UnifiedRecord>,
    pub combined: UnifiedRecord,
}
