use std::collections::HashMap;

use super::normalizers::{MetricsNormalizer, NpiNormalizer, PlacesNormalizer, SourceNormalizer};
use crate::types::{CanonicalRecord, RawRecord, SourceKind};

/// Registry for source-specific normalization strategies
pub struct NormalizationRegistry {
    normalizers: HashMap<SourceKind, Box<dyn SourceNormalizer>>,
}

impl NormalizationRegistry {
    /// Create a registry with the built-in normalizers
    pub fn new() -> Self {
        let mut normalizers: HashMap<SourceKind, Box<dyn SourceNormalizer>> = HashMap::new();
        normalizers.insert(
            SourceKind::Registry,
            Box::new(MetricsNormalizer::new(NpiNormalizer::new())),
        );
        normalizers.insert(
            SourceKind::Search,
            Box::new(MetricsNormalizer::new(PlacesNormalizer::new())),
        );
        Self { normalizers }
    }

    /// Replace the normalizer for a source
    pub fn register(&mut self, normalizer: Box<dyn SourceNormalizer>) {
        self.normalizers.insert(normalizer.source_kind(), normalizer);
    }

    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        match self.normalizers.get(&raw.source) {
            Some(normalizer) => normalizer.normalize(raw),
            // Every source kind is registered in `new`; a replaced map still falls back safely
            None => PlacesNormalizer::new().normalize(raw),
        }
    }

    /// Normalize and tag the record with the plan that produced it
    pub fn normalize_tagged(&self, raw: &RawRecord, source_tag: &str) -> CanonicalRecord {
        let mut record = self.normalize(raw);
        if !record.sources.iter().any(|s| s == source_tag) {
            record.sources.push(source_tag.to_string());
        }
        record
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;
    use serde_json::json;

    struct FixedNormalizer;

    impl SourceNormalizer for FixedNormalizer {
        fn normalize(&self, _raw: &RawRecord) -> CanonicalRecord {
            CanonicalRecord::new(RecordId::External("fixed".into()), "Fixed")
        }

        fn source_kind(&self) -> SourceKind {
            SourceKind::Search
        }
    }

    #[test]
    fn test_normalize_tagged_adds_source_once() {
        let registry = NormalizationRegistry::new();
        let raw = RawRecord::new(SourceKind::Registry, json!({ "number": "1" }));
        let record = registry.normalize_tagged(&raw, "registry:taxonomy:Dentist");
        assert_eq!(record.sources, vec!["registry:taxonomy:Dentist".to_string()]);
    }

    #[test]
    fn test_register_replaces_normalizer() {
        let mut registry = NormalizationRegistry::new();
        registry.register(Box::new(FixedNormalizer));
        let record = registry.normalize(&RawRecord::new(SourceKind::Search, json!({})));
        assert_eq!(record.name, "Fixed");
    }
}
