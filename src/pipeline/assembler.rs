use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::{AssemblyConfig, Config, ProfileSelection};
use crate::observability::metrics;
use crate::pipeline::processing::classify::{ClassificationResult, TaxonomyClassifier};
use crate::pipeline::processing::scoring::{ConfidenceScorer, RuleTable, ScoreResult, Tier};
use crate::types::{CanonicalRecord, Category};

/// A merged record with its classification and score, computed once at assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledRecord {
    pub record: CanonicalRecord,
    pub classification: ClassificationResult,
    pub score: ScoreResult,
    /// Taxonomy category, or the first keyword-inferred one when taxonomy says unclassified
    pub category: Category,
}

/// Flat export projection, one row per record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
    pub category: Category,
    pub score: i32,
    pub tier: Tier,
    pub sources: String,
}

impl From<&AssembledRecord> for ExportRow {
    fn from(assembled: &AssembledRecord) -> Self {
        let record = &assembled.record;
        let address = record.practice_address.clone().unwrap_or_default();
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            address: address.street(),
            city: address.city,
            state: address.state,
            postal_code: address.postal_code,
            phone: record.phone.clone().unwrap_or_default(),
            category: assembled.category,
            score: assembled.score.score,
            tier: assembled.score.tier,
            sources: record.sources.join(";"),
        }
    }
}

/// Scores, classifies and orders the final collection
pub struct Assembler {
    classifier: TaxonomyClassifier,
    scorer: ConfidenceScorer,
    settings: AssemblyConfig,
}

impl Assembler {
    pub fn from_config(config: &Config) -> Self {
        let classifier = TaxonomyClassifier::from_config(&config.classification);
        let scorer = ConfidenceScorer::new(RuleTable::from_config(&config.scoring), classifier.clone());
        Self {
            classifier,
            scorer,
            settings: config.assembly.clone(),
        }
    }

    pub fn with_profile(mut self, selection: ProfileSelection) -> Self {
        let table = self.scorer.table().clone().with_profile(selection);
        self.scorer = ConfidenceScorer::new(table, self.classifier.clone());
        self
    }

    pub fn with_min_score(mut self, min_score: i32) -> Self {
        self.settings.min_score = min_score;
        self
    }

    pub fn assemble_one(&self, record: CanonicalRecord) -> AssembledRecord {
        let classification = self.classifier.classify(&record);
        let score = self.scorer.score(&record);
        let category = if classification.category.is_classified() {
            classification.category
        } else {
            score
                .matched_categories
                .first()
                .copied()
                .unwrap_or(Category::Unclassified)
        };
        metrics::scoring::score_recorded(score.score, score.tier.as_str());
        AssembledRecord {
            record,
            classification,
            score,
            category,
        }
    }

    /// Every record, scored and sorted. Nothing is dropped here.
    pub fn assemble(&self, records: Vec<CanonicalRecord>) -> Vec<AssembledRecord> {
        let mut assembled: Vec<AssembledRecord> = records.into_iter().map(|r| self.assemble_one(r)).collect();
        assembled.sort_by(compare);
        assembled
    }

    /// Threshold and category filter over assembled records
    pub fn select<'a>(&'a self, assembled: &'a [AssembledRecord]) -> impl Iterator<Item = &'a AssembledRecord> + 'a {
        assembled.iter().filter(move |a| {
            a.score.score >= self.settings.min_score
                && (self.settings.include_unclassified || a.category.is_classified())
        })
    }

    pub fn export_rows(&self, assembled: &[AssembledRecord]) -> Vec<ExportRow> {
        self.select(assembled).map(ExportRow::from).collect()
    }
}

/// Score descending, then case-insensitive name, then identifier
fn compare(a: &AssembledRecord, b: &AssembledRecord) -> Ordering {
    b.score
        .score
        .cmp(&a.score.score)
        .then_with(|| a.record.name.to_lowercase().cmp(&b.record.name.to_lowercase()))
        .then_with(|| a.record.id.cmp(&b.record.id))
}
