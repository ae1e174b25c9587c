use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::base::{NormalizerUtils, SourceNormalizer};
use crate::pipeline::processing::normalize::IdentityStrategy;
use crate::types::{Address, CanonicalRecord, RawRecord, SourceKind};

static STATE_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2})(?:\s+(\d{5}(?:-\d{4})?))?$").expect("valid state/zip pattern")
});

/// Normalizer for free-text places search results
pub struct PlacesNormalizer {
    identity: IdentityStrategy,
}

impl PlacesNormalizer {
    pub fn new() -> Self {
        Self {
            identity: IdentityStrategy::DerivedHash,
        }
    }

    /// Address given either as a structured object or as one comma separated line
    fn address(data: &Value) -> Option<Address> {
        let address = match data.get("address").or_else(|| data.get("formatted_address")) {
            Some(Value::String(text)) => Self::parse_address_text(text),
            Some(obj @ Value::Object(_)) => Address {
                line1: NormalizerUtils::first_str(obj, &["line1", "street", "address_1"]).unwrap_or_default(),
                line2: NormalizerUtils::first_str(obj, &["line2", "address_2"]),
                city: NormalizerUtils::str_field(obj, "city").unwrap_or_default(),
                state: NormalizerUtils::str_field(obj, "state").unwrap_or_default(),
                postal_code: NormalizerUtils::first_str(obj, &["postal_code", "zip"]).unwrap_or_default(),
                country_code: NormalizerUtils::first_str(obj, &["country_code", "country"]),
            },
            _ => return None,
        };
        Some(address).filter(|a| !a.is_empty())
    }

    /// "100 Main St, Austin, TX 78701" style text
    pub fn parse_address_text(text: &str) -> Address {
        let parts: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let mut address = Address {
            line1: parts.first().map(|p| p.to_string()).unwrap_or_default(),
            ..Address::default()
        };

        let mut rest: Vec<&str> = parts.iter().skip(1).copied().collect();
        // Trailing country names are dropped
        if rest.len() > 1 && matches!(rest.last(), Some(&"USA") | Some(&"US") | Some(&"United States")) {
            rest.pop();
        }
        if let Some(last) = rest.last() {
            if let Some(caps) = STATE_ZIP.captures(last) {
                address.state = caps[1].to_uppercase();
                address.postal_code = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
                rest.pop();
            }
        }
        if let Some(city) = rest.last() {
            address.city = city.to_string();
        }
        address
    }
}

impl Default for PlacesNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for PlacesNormalizer {
    fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let data = &raw.payload;
        let name = NormalizerUtils::first_str(data, &["name", "title"])
            .map(|n| NormalizerUtils::clean(&n))
            .unwrap_or_default();
        let description = NormalizerUtils::first_str(data, &["description", "snippet"])
            .map(|d| NormalizerUtils::clean(&d));
        let practice_address = Self::address(data);

        let first_line = practice_address
            .as_ref()
            .map(|a| a.line1.as_str())
            .unwrap_or("");
        let external = NormalizerUtils::first_str(data, &["npi", "number"]);
        let id = self.identity.identify(external.as_deref(), &name, first_line);

        let mut record = CanonicalRecord::new(id, &name);
        let text = description.clone().unwrap_or_default();
        record.phone = NormalizerUtils::str_field(data, "phone")
            .and_then(|p| NormalizerUtils::extract_phone(&p))
            .or_else(|| NormalizerUtils::extract_phone_excluding_fax(&text));
        record.fax = NormalizerUtils::str_field(data, "fax")
            .and_then(|f| NormalizerUtils::extract_phone(&f))
            .or_else(|| NormalizerUtils::extract_fax(&text));
        record.website = NormalizerUtils::first_str(data, &["website", "url", "link"]);
        record.description = description;
        record.practice_address = practice_address;
        record
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Search
    }
}
