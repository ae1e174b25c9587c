//! Record normalization: raw source payloads into `CanonicalRecord`s.

pub mod normalizers;
pub mod registry;

use sha2::{Digest, Sha256};

use crate::types::{CanonicalRecord, RawRecord, RecordId};

pub use registry::NormalizationRegistry;

/// How the canonical identifier of a record is obtained.
///
/// Swapping the strategy changes the merge key without touching merge semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Use the upstream identifier, falling back to the derived hash when it is missing
    ExternalId,
    /// Hash of the lowercased display name and first address line
    DerivedHash,
}

impl IdentityStrategy {
    pub fn identify(&self, external: Option<&str>, name: &str, first_line: &str) -> RecordId {
        match (self, external.map(str::trim).filter(|id| !id.is_empty())) {
            (IdentityStrategy::ExternalId, Some(id)) => RecordId::External(id.to_string()),
            _ => derived_id(name, first_line),
        }
    }
}

/// Two sightings with the same name and first address line collapse to one identifier
pub fn derived_id(name: &str, first_line: &str) -> RecordId {
    let mut hasher = Sha256::new();
    hasher.update(normalize_key(name).as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_key(first_line).as_bytes());
    RecordId::Derived(hex::encode(hasher.finalize()))
}

fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize one raw record with the built-in normalizers
pub fn normalize(raw: &RawRecord) -> CanonicalRecord {
    NormalizationRegistry::new().normalize(raw)
}
