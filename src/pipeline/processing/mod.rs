// Pipeline processing: normalization, merge, classification, and scoring

#[cfg(test)]
pub(crate) mod arbitrary;
pub mod classify;
pub mod conflation;
pub mod normalize;
pub mod scoring;

pub use classify::{ClassificationResult, TaxonomyClassifier};
pub use conflation::{merge, RecordCollection, UpsertOutcome};
pub use normalize::{IdentityStrategy, NormalizationRegistry};
pub use scoring::{ConfidenceScorer, RuleTable, ScoreReason, ScoreResult, ScoringProfile, Tier};
