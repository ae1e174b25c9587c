use serde::{Deserialize, Serialize};

use crate::config::ClassificationConfig;
use crate::types::{CanonicalRecord, Category};

/// Category derived from a record's taxonomy list. Always recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    /// The taxonomy code that decided the category, absent when unclassified
    pub matched_code: Option<String>,
}

impl ClassificationResult {
    pub fn unclassified() -> Self {
        Self {
            category: Category::Unclassified,
            matched_code: None,
        }
    }
}

/// Maps taxonomy codes onto target categories by code prefix
#[derive(Debug, Clone)]
pub struct TaxonomyClassifier {
    tables: Vec<(Category, Vec<String>)>,
}

impl TaxonomyClassifier {
    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self {
            tables: config
                .categories
                .iter()
                .filter(|table| table.category.is_classified())
                .map(|table| {
                    let prefixes = table
                        .codes
                        .iter()
                        .map(|code| code.trim().to_uppercase())
                        .filter(|code| !code.is_empty())
                        .collect();
                    (table.category, prefixes)
                })
                .collect(),
        }
    }

    /// Category of a single code, tables checked in configured order
    pub fn category_of(&self, code: &str) -> Option<Category> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return None;
        }
        self.tables
            .iter()
            .find(|(_, prefixes)| prefixes.iter().any(|prefix| code.starts_with(prefix.as_str())))
            .map(|(category, _)| *category)
    }

    /// First taxonomy code, in record order, that belongs to any category table
    pub fn classify(&self, record: &CanonicalRecord) -> ClassificationResult {
        record
            .taxonomy_codes()
            .find_map(|code| {
                self.category_of(code).map(|category| ClassificationResult {
                    category,
                    matched_code: Some(code.to_string()),
                })
            })
            .unwrap_or_else(ClassificationResult::unclassified)
    }
}

impl Default for TaxonomyClassifier {
    fn default() -> Self {
        Self::from_config(&ClassificationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryCodes;
    use crate::types::{RecordId, TaxonomyEntry};

    fn with_codes(codes: &[&str]) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(RecordId::External("1".into()), "Test");
        record.taxonomies = codes
            .iter()
            .map(|code| TaxonomyEntry {
                code: code.to_string(),
                description: String::new(),
                primary: false,
            })
            .collect();
        record
    }

    #[test]
    fn test_empty_taxonomy_list_is_unclassified() {
        let result = TaxonomyClassifier::default().classify(&with_codes(&[]));
        assert_eq!(result, ClassificationResult::unclassified());
    }

    #[test]
    fn test_prefix_match_per_family() {
        let classifier = TaxonomyClassifier::default();
        assert_eq!(classifier.classify(&with_codes(&["1223G0001X"])).category, Category::Dentist);
        assert_eq!(classifier.classify(&with_codes(&["207ND0101X"])).category, Category::Dermatologist);
        assert_eq!(classifier.classify(&with_codes(&["2082S0099X"])).category, Category::PlasticSurgeon);
        assert_eq!(classifier.classify(&with_codes(&["207YS0123X"])).category, Category::PlasticSurgeon);
    }

    #[test]
    fn test_first_matching_code_in_record_order_wins() {
        let classifier = TaxonomyClassifier::default();
        let result = classifier.classify(&with_codes(&["363LF0000X", "2082S0099X", "1223G0001X"]));
        assert_eq!(result.category, Category::PlasticSurgeon);
        assert_eq!(result.matched_code.as_deref(), Some("2082S0099X"));
    }

    #[test]
    fn test_unmatched_codes_are_unclassified() {
        let classifier = TaxonomyClassifier::default();
        let result = classifier.classify(&with_codes(&["363LF0000X", "", "  "]));
        assert_eq!(result.category, Category::Unclassified);
        assert!(result.matched_code.is_none());
    }

    #[test]
    fn test_custom_tables_and_case() {
        let config = ClassificationConfig {
            categories: vec![
                CategoryCodes {
                    category: Category::MedSpa,
                    codes: vec!["363l".into()],
                },
                CategoryCodes {
                    category: Category::Unclassified,
                    codes: vec!["2082".into()],
                },
            ],
        };
        let classifier = TaxonomyClassifier::from_config(&config);
        assert_eq!(classifier.category_of("363LF0000X"), Some(Category::MedSpa));
        // An Unclassified table never produces a category
        assert_eq!(classifier.category_of("2082S0099X"), None);
    }
}
