use serde_json::Value;

use super::base::{NormalizerUtils, SourceNormalizer};
use crate::pipeline::processing::normalize::IdentityStrategy;
use crate::types::{Address, AlternateId, CanonicalRecord, RawRecord, SourceKind, TaxonomyEntry};

/// Normalizer for NPPES registry results
pub struct NpiNormalizer {
    identity: IdentityStrategy,
}

impl NpiNormalizer {
    pub fn new() -> Self {
        Self {
            identity: IdentityStrategy::ExternalId,
        }
    }

    /// Organization name, or the individual's name with credential
    fn display_name(basic: &Value) -> String {
        if let Some(org) = NormalizerUtils::str_field(basic, "organization_name") {
            return NormalizerUtils::clean(&org);
        }
        let person = [
            NormalizerUtils::str_field(basic, "first_name"),
            NormalizerUtils::str_field(basic, "last_name"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        match NormalizerUtils::str_field(basic, "credential") {
            Some(credential) if !person.is_empty() => format!("{}, {}", person, credential),
            _ => person,
        }
    }

    fn authorized_official(basic: &Value) -> Option<String> {
        let name = [
            NormalizerUtils::str_field(basic, "authorized_official_first_name"),
            NormalizerUtils::str_field(basic, "authorized_official_last_name"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        if name.is_empty() {
            return None;
        }
        match NormalizerUtils::str_field(basic, "authorized_official_title_or_position") {
            Some(title) => Some(format!("{} ({})", name, title)),
            None => Some(name),
        }
    }

    fn address(data: &Value) -> Address {
        Address {
            line1: NormalizerUtils::str_field(data, "address_1").unwrap_or_default(),
            line2: NormalizerUtils::str_field(data, "address_2"),
            city: NormalizerUtils::str_field(data, "city").unwrap_or_default(),
            state: NormalizerUtils::str_field(data, "state").unwrap_or_default(),
            postal_code: NormalizerUtils::str_field(data, "postal_code").unwrap_or_default(),
            country_code: NormalizerUtils::str_field(data, "country_code"),
        }
    }

    fn has_purpose(data: &Value, purpose: &str) -> bool {
        NormalizerUtils::str_field(data, "address_purpose")
            .map(|p| p.eq_ignore_ascii_case(purpose))
            .unwrap_or(false)
    }

    fn taxonomies(payload: &Value) -> Vec<TaxonomyEntry> {
        NormalizerUtils::array(payload, "taxonomies")
            .iter()
            .filter_map(|t| {
                let code = NormalizerUtils::str_field(t, "code")?;
                Some(TaxonomyEntry {
                    code,
                    description: NormalizerUtils::str_field(t, "desc").unwrap_or_default(),
                    primary: t.get("primary").and_then(Value::as_bool).unwrap_or(false),
                })
            })
            .collect()
    }

    fn alternate_ids(payload: &Value) -> Vec<AlternateId> {
        NormalizerUtils::array(payload, "identifiers")
            .iter()
            .filter_map(|i| {
                let value = NormalizerUtils::str_field(i, "identifier")?;
                Some(AlternateId {
                    kind: NormalizerUtils::first_str(i, &["desc", "code"]).unwrap_or_default(),
                    value,
                    issuer: NormalizerUtils::str_field(i, "issuer"),
                    state: NormalizerUtils::str_field(i, "state"),
                })
            })
            .collect()
    }

    fn website(payload: &Value) -> Option<String> {
        NormalizerUtils::array(payload, "endpoints")
            .iter()
            .filter(|e| {
                NormalizerUtils::first_str(e, &["endpointType", "endpoint_type"])
                    .map(|t| t.eq_ignore_ascii_case("WEB"))
                    .unwrap_or(false)
            })
            .find_map(|e| NormalizerUtils::str_field(e, "endpoint"))
    }
}

impl Default for NpiNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for NpiNormalizer {
    fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let payload = &raw.payload;
        let basic = payload.get("basic").unwrap_or(&Value::Null);
        let name = Self::display_name(basic);

        let addresses = NormalizerUtils::array(payload, "addresses");
        // Location address preferred, else the first listed one
        let practice = addresses
            .iter()
            .find(|a| Self::has_purpose(a, "LOCATION"))
            .or_else(|| addresses.first());
        let mailing = addresses.iter().find(|a| Self::has_purpose(a, "MAILING"));

        let practice_address = practice.map(Self::address).filter(|a| !a.is_empty());
        let mailing_address = mailing.map(Self::address).filter(|a| !a.is_empty());

        let first_line = practice_address
            .as_ref()
            .map(|a| a.line1.as_str())
            .unwrap_or("");
        let number = NormalizerUtils::str_field(payload, "number");
        let id = self.identity.identify(number.as_deref(), &name, first_line);

        let mut record = CanonicalRecord::new(id, &name);
        record.phone = practice
            .and_then(|a| NormalizerUtils::str_field(a, "telephone_number"))
            .or_else(|| NormalizerUtils::str_field(basic, "authorized_official_telephone_number"));
        record.fax = practice.and_then(|a| NormalizerUtils::str_field(a, "fax_number"));
        record.practice_address = practice_address;
        record.mailing_address = mailing_address;
        record.website = Self::website(payload);
        record.authorized_official = Self::authorized_official(basic);
        record.taxonomies = Self::taxonomies(payload);
        record.alternate_ids = Self::alternate_ids(payload);
        record.alternate_names = NormalizerUtils::array(payload, "other_names")
            .iter()
            .filter_map(|n| NormalizerUtils::str_field(n, "organization_name"))
            .map(|n| NormalizerUtils::clean(&n))
            .filter(|n| *n != name)
            .collect();
        record
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Registry
    }
}
