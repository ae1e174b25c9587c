use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::observability::metrics;
use crate::types::{CanonicalRecord, RawRecord, SourceKind};

/// Base trait for source-specific normalizers.
///
/// Normalization never fails: absent or malformed optional fields become empty values.
pub trait SourceNormalizer: Send + Sync {
    fn normalize(&self, raw: &RawRecord) -> CanonicalRecord;

    /// The source this normalizer handles
    fn source_kind(&self) -> SourceKind;
}

/// A wrapper that adds metrics to any normalizer implementation
pub struct MetricsNormalizer<N: SourceNormalizer> {
    inner: N,
}

impl<N: SourceNormalizer> MetricsNormalizer<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: SourceNormalizer> SourceNormalizer for MetricsNormalizer<N> {
    fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let record = self.inner.normalize(raw);
        metrics::normalize::record_normalized(self.inner.source_kind().as_str());
        record
    }

    fn source_kind(&self) -> SourceKind {
        self.inner.source_kind()
    }
}

// Optional area code (parentheses optional), three digits, separator, four digits
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]\d{4}").expect("valid phone pattern"));

static FAX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fax\s*(?:number|no\.?)?\s*[:.]?\s*((?:\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]\d{4})")
        .expect("valid fax pattern")
});

/// Field helpers shared by normalizers
pub struct NormalizerUtils;

impl NormalizerUtils {
    /// First non-blank string among `keys`, trimmed. Numbers are rendered as strings.
    pub fn first_str(data: &Value, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match data.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn str_field(data: &Value, key: &str) -> Option<String> {
        Self::first_str(data, &[key])
    }

    pub fn array<'a>(data: &'a Value, key: &str) -> &'a [Value] {
        data.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First phone-shaped substring; no validation beyond the pattern
    pub fn extract_phone(text: &str) -> Option<String> {
        PHONE_PATTERN.find(text).map(|m| m.as_str().trim().to_string())
    }

    /// First phone-shaped substring outside any "fax" labelled number
    pub fn extract_phone_excluding_fax(text: &str) -> Option<String> {
        let fax_spans: Vec<(usize, usize)> = FAX_PATTERN
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| (m.start(), m.end()))
            .collect();
        PHONE_PATTERN
            .find_iter(text)
            .find(|m| !fax_spans.iter().any(|&(start, end)| m.start() < end && start < m.end()))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Phone-shaped substring that follows a "fax" label
    pub fn extract_fax(text: &str) -> Option<String> {
        FAX_PATTERN
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Collapse inner whitespace runs
    pub fn clean(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
