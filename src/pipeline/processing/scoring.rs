//! Confidence scoring.
//!
//! Scoring is a declarative rule table folded over one record. Each rule contributes an
//! independent delta, so rule order never changes the result, and every applied rule leaves a
//! [`ScoreReason`] behind. The running total is clamped once at the end.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::classify::TaxonomyClassifier;
use crate::config::{ProfileSelection, ScoringConfig};
use crate::constants::{SCORE_CEILING, SCORE_FLOOR};
use crate::types::{CanonicalRecord, Category};

/// Coarse confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn from_score(score: i32, high_threshold: i32, medium_threshold: i32) -> Self {
        if score >= high_threshold {
            Tier::High
        } else if score >= medium_threshold {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low => "Low",
        }
    }
}

/// Base-score variant of the same rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringProfile {
    /// Records grounded by registry taxonomy
    Registry,
    /// Free-text hits without taxonomy grounding
    Keyword,
}

impl ScoringProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringProfile::Registry => "registry",
            ScoringProfile::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Base,
    Primary,
    Service,
    Taxonomy,
    Professional,
    Exclusion,
    Clamp,
}

/// One contribution to a score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReason {
    pub rule: RuleKind,
    pub detail: String,
    pub delta: i32,
}

impl ScoreReason {
    fn new(rule: RuleKind, detail: impl Into<String>, delta: i32) -> Self {
        Self {
            rule,
            detail: detail.into(),
            delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Clamped to 0..=100
    pub score: i32,
    pub tier: Tier,
    pub profile: ScoringProfile,
    /// Reasons in rule-table order; their deltas sum to `score`
    pub reasons: Vec<ScoreReason>,
    /// Categories whose primary keywords matched the display name, in table order
    pub matched_categories: Vec<Category>,
}

#[derive(Debug, Clone)]
enum Rule {
    /// Added once per category however many synonyms match
    Primary {
        category: Category,
        keywords: Vec<String>,
        weight: i32,
    },
    /// Cumulative across keywords
    Service { keyword: String, weight: i32 },
    /// Added once per matching taxonomy code
    Taxonomy { prefix: String, weight: i32 },
    /// Flat bonus once, whichever phrase matches
    Professional { phrases: Vec<String>, bonus: i32 },
    Exclusion {
        phrase: String,
        penalty: i32,
        except: Option<Category>,
    },
}

/// What the rules look at, computed once per record
struct ScoringContext<'a> {
    record: &'a CanonicalRecord,
    name: String,
    text: String,
    /// Taxonomy category plus keyword-matched categories
    categories: BTreeSet<Category>,
}

/// The configured rule table with its thresholds and profile bases
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
    selection: ProfileSelection,
    registry_base: i32,
    keyword_base: i32,
    high_threshold: i32,
    medium_threshold: i32,
}

impl RuleTable {
    pub fn from_config(config: &ScoringConfig) -> Self {
        let lower = |values: &[String]| -> Vec<String> {
            values
                .iter()
                .map(|v| v.to_lowercase())
                .filter(|v| !v.trim().is_empty())
                .collect()
        };

        // One primary rule per category: keywords are unioned and the largest weight wins,
        // so repeated [[scoring.primary]] entries score the same in any order.
        let mut rules: Vec<Rule> = Vec::new();
        for primary in &config.primary {
            let existing = rules.iter_mut().find_map(|rule| match rule {
                Rule::Primary { category, keywords, weight } if *category == primary.category => {
                    Some((keywords, weight))
                }
                _ => None,
            });
            match existing {
                Some((keywords, weight)) => {
                    for keyword in lower(&primary.keywords) {
                        if !keywords.contains(&keyword) {
                            keywords.push(keyword);
                        }
                    }
                    *weight = (*weight).max(primary.weight);
                }
                None => rules.push(Rule::Primary {
                    category: primary.category,
                    keywords: lower(&primary.keywords),
                    weight: primary.weight,
                }),
            }
        }
        for keyword in lower(&config.service_keywords) {
            rules.push(Rule::Service {
                keyword,
                weight: config.service_weight,
            });
        }
        for code in &config.aesthetic_taxonomy_codes {
            rules.push(Rule::Taxonomy {
                prefix: code.trim().to_uppercase(),
                weight: config.taxonomy_weight,
            });
        }
        rules.push(Rule::Professional {
            phrases: lower(&config.professional_phrases),
            bonus: config.professional_bonus,
        });
        for exclusion in &config.exclusions {
            rules.push(Rule::Exclusion {
                phrase: exclusion.phrase.to_lowercase(),
                penalty: exclusion.penalty,
                except: exclusion.except_category,
            });
        }

        Self {
            rules,
            selection: config.profile,
            registry_base: config.registry_base,
            keyword_base: config.keyword_base,
            high_threshold: config.high_threshold,
            medium_threshold: config.medium_threshold,
        }
    }

    pub fn with_profile(mut self, selection: ProfileSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn profile_for(&self, record: &CanonicalRecord) -> ScoringProfile {
        match self.selection {
            ProfileSelection::Registry => ScoringProfile::Registry,
            ProfileSelection::Keyword => ScoringProfile::Keyword,
            ProfileSelection::Auto if record.taxonomies.is_empty() => ScoringProfile::Keyword,
            ProfileSelection::Auto => ScoringProfile::Registry,
        }
    }

    pub fn base(&self, profile: ScoringProfile) -> i32 {
        match profile {
            ScoringProfile::Registry => self.registry_base,
            ScoringProfile::Keyword => self.keyword_base,
        }
    }

    pub fn tier(&self, score: i32) -> Tier {
        Tier::from_score(score, self.high_threshold, self.medium_threshold)
    }

    fn primary_matches(&self, name: &str) -> Vec<Category> {
        let mut matched = Vec::new();
        for rule in &self.rules {
            if let Rule::Primary { category, keywords, .. } = rule {
                if !matched.contains(category) && keywords.iter().any(|k| name.contains(k.as_str())) {
                    matched.push(*category);
                }
            }
        }
        matched
    }

    /// Reasons one rule contributes; empty when it does not apply
    fn apply(&self, rule: &Rule, ctx: &ScoringContext<'_>, primary_seen: &mut BTreeSet<Category>) -> Vec<ScoreReason> {
        match rule {
            Rule::Primary { category, keywords, weight } => {
                if primary_seen.contains(category) {
                    return Vec::new();
                }
                match keywords.iter().find(|k| ctx.name.contains(k.as_str())) {
                    Some(keyword) => {
                        primary_seen.insert(*category);
                        vec![ScoreReason::new(
                            RuleKind::Primary,
                            format!("{} keyword '{}'", category, keyword),
                            *weight,
                        )]
                    }
                    None => Vec::new(),
                }
            }
            Rule::Service { keyword, weight } if ctx.text.contains(keyword.as_str()) => {
                vec![ScoreReason::new(RuleKind::Service, format!("service '{}'", keyword), *weight)]
            }
            Rule::Service { .. } => Vec::new(),
            Rule::Taxonomy { prefix, weight } => ctx
                .record
                .taxonomy_codes()
                .filter(|code| !prefix.is_empty() && code.to_uppercase().starts_with(prefix.as_str()))
                .map(|code| ScoreReason::new(RuleKind::Taxonomy, format!("taxonomy {}", code), *weight))
                .collect(),
            Rule::Professional { phrases, bonus } => phrases
                .iter()
                .find(|p| ctx.text.contains(p.as_str()))
                .map(|p| vec![ScoreReason::new(RuleKind::Professional, format!("'{}'", p.trim()), *bonus)])
                .unwrap_or_default(),
            Rule::Exclusion { phrase, penalty, except } => {
                let exempt = except.map(|c| ctx.categories.contains(&c)).unwrap_or(false);
                if phrase.is_empty() || exempt || !ctx.text.contains(phrase.as_str()) {
                    return Vec::new();
                }
                vec![ScoreReason::new(RuleKind::Exclusion, format!("excluded '{}'", phrase), -penalty)]
            }
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// Pure scoring of a fully merged record
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    table: RuleTable,
    classifier: TaxonomyClassifier,
}

impl ConfidenceScorer {
    pub fn new(table: RuleTable, classifier: TaxonomyClassifier) -> Self {
        Self { table, classifier }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn score(&self, record: &CanonicalRecord) -> ScoreResult {
        self.score_with(record, self.table.profile_for(record))
    }

    pub fn score_with(&self, record: &CanonicalRecord, profile: ScoringProfile) -> ScoreResult {
        let name = record.name.to_lowercase();
        let matched_categories = self.table.primary_matches(&name);

        let mut categories: BTreeSet<Category> = matched_categories.iter().copied().collect();
        let taxonomy_category = self.classifier.classify(record).category;
        if taxonomy_category.is_classified() {
            categories.insert(taxonomy_category);
        }

        let ctx = ScoringContext {
            record,
            name,
            text: record.searchable_text(),
            categories,
        };

        let base = self.table.base(profile);
        let mut reasons = vec![ScoreReason::new(RuleKind::Base, format!("{} profile", profile.as_str()), base)];
        let mut primary_seen = BTreeSet::new();
        for rule in &self.table.rules {
            reasons.extend(self.table.apply(rule, &ctx, &mut primary_seen));
        }

        let raw: i32 = reasons.iter().map(|r| r.delta).sum();
        let score = raw.clamp(SCORE_FLOOR, SCORE_CEILING);
        if score != raw {
            reasons.push(ScoreReason::new(RuleKind::Clamp, format!("clamped from {}", raw), score - raw));
        }

        ScoreResult {
            score,
            tier: self.table.tier(score),
            profile,
            reasons,
            matched_categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExclusionRule, PrimaryKeywords};
    use crate::types::{RecordId, TaxonomyEntry};

    fn record(name: &str, description: Option<&str>) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(RecordId::Derived("x".into()), name);
        record.description = description.map(str::to_string);
        record
    }

    fn with_taxonomy(mut record: CanonicalRecord, code: &str) -> CanonicalRecord {
        record.taxonomies.push(TaxonomyEntry {
            code: code.into(),
            description: String::new(),
            primary: true,
        });
        record
    }

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::default()
    }

    #[test]
    fn test_manhattan_medical_spa_by_profile() {
        let r = record(
            "Manhattan Medical Spa",
            Some("licensed, offers botox and laser treatments"),
        );
        let keyword = scorer().score_with(&r, ScoringProfile::Keyword);
        assert_eq!(keyword.score, 95);
        assert_eq!(keyword.tier, Tier::High);
        assert_eq!(keyword.matched_categories, vec![Category::MedSpa]);

        let registry = scorer().score_with(&r, ScoringProfile::Registry);
        assert_eq!(registry.score, 55);
        assert_eq!(registry.tier, Tier::Medium);
    }

    #[test]
    fn test_auto_profile_follows_taxonomy_presence() {
        let plain = record("Glow", None);
        assert_eq!(scorer().score(&plain).profile, ScoringProfile::Keyword);
        let grounded = with_taxonomy(record("Glow", None), "207N00000X");
        assert_eq!(scorer().score(&grounded).profile, ScoringProfile::Registry);
    }

    #[test]
    fn test_empty_record_scores_base_only() {
        let empty = record("", None);
        let keyword = scorer().score_with(&empty, ScoringProfile::Keyword);
        assert_eq!(keyword.score, 40);
        assert_eq!(keyword.reasons.len(), 1);
        assert_eq!(scorer().score_with(&empty, ScoringProfile::Registry).score, 0);
    }

    #[test]
    fn test_primary_counts_once_per_category() {
        let r = record("Med Spa Medspa Medical Spa", None);
        let result = scorer().score_with(&r, ScoringProfile::Registry);
        let primaries = result.reasons.iter().filter(|r| r.rule == RuleKind::Primary).count();
        assert_eq!(primaries, 1);
        assert_eq!(result.score, 30);
    }

    #[test]
    fn test_score_is_clamped_and_reasons_sum_to_score() {
        let high = record(
            "Aesthetic Dermatology Plastic Surgery Med Spa",
            Some("botox filler laser microneedling hydrafacial kybella board certified"),
        );
        let result = scorer().score_with(&high, ScoringProfile::Keyword);
        assert_eq!(result.score, 100);
        assert_eq!(result.reasons.iter().map(|r| r.delta).sum::<i32>(), 100);
        assert_eq!(result.reasons.last().unwrap().rule, RuleKind::Clamp);

        let low = record("Animal Hospital Urgent Care", Some("veterinary pharmacy"));
        let result = scorer().score_with(&low, ScoringProfile::Registry);
        assert_eq!(result.score, 0);
        assert_eq!(result.tier, Tier::Low);
    }

    #[test]
    fn test_dental_exclusion_exempt_for_dentists() {
        let clinic = record("Bright Dental Studio", Some("veneers and invisalign"));
        let result = scorer().score_with(&clinic, ScoringProfile::Registry);
        assert!(result.reasons.iter().all(|r| r.rule != RuleKind::Exclusion));
        assert_eq!(result.matched_categories, vec![Category::Dentist]);

        let spa = record("Glow Med Spa", Some("also offers pediatric care"));
        let result = scorer().score_with(&spa, ScoringProfile::Keyword);
        assert!(result.reasons.iter().any(|r| r.rule == RuleKind::Exclusion));
    }

    #[test]
    fn test_taxonomy_category_exempts_exclusion() {
        let r = with_taxonomy(record("Smith Family Practice", Some("pediatric patients")), "1223P0221X");
        let result = scorer().score(&r);
        assert!(result.reasons.iter().all(|r| r.rule != RuleKind::Exclusion));
    }

    #[test]
    fn test_aesthetic_taxonomy_adds_per_code() {
        let r = with_taxonomy(with_taxonomy(record("Clinic", None), "207N00000X"), "363LF0000X");
        let result = scorer().score_with(&r, ScoringProfile::Registry);
        assert_eq!(result.score, 30);
    }

    #[test]
    fn test_rule_order_does_not_change_score() {
        let r = record("Laser Skin Clinic MD", Some("board certified, botox, nail care"));
        let table = RuleTable::default();
        let mut reversed = table.clone();
        reversed.rules.reverse();

        let a = ConfidenceScorer::new(table, TaxonomyClassifier::default()).score(&r);
        let b = ConfidenceScorer::new(reversed, TaxonomyClassifier::default()).score(&r);
        assert_eq!(a.score, b.score);
        assert_eq!(a.matched_categories, b.matched_categories);
    }

    #[test]
    fn test_repeated_primary_category_is_order_independent() {
        let config = ScoringConfig {
            primary: vec![
                PrimaryKeywords {
                    category: Category::MedSpa,
                    keywords: vec!["spa".into()],
                    weight: 30,
                },
                PrimaryKeywords {
                    category: Category::MedSpa,
                    keywords: vec!["glow".into()],
                    weight: 10,
                },
            ],
            ..ScoringConfig::default()
        };
        let table = RuleTable::from_config(&config);
        let primaries = table.rules.iter().filter(|r| matches!(r, Rule::Primary { .. })).count();
        assert_eq!(primaries, 1);

        let mut reversed = table.clone();
        reversed.rules.reverse();
        let r = record("Glow Spa", None);
        let forward = ConfidenceScorer::new(table, TaxonomyClassifier::default()).score_with(&r, ScoringProfile::Keyword);
        let backward =
            ConfidenceScorer::new(reversed, TaxonomyClassifier::default()).score_with(&r, ScoringProfile::Keyword);
        assert_eq!(forward.score, 70);
        assert_eq!(backward.score, 70);

        // A name matching only the lighter entry still gets the category weight
        let glow_only = ConfidenceScorer::new(RuleTable::from_config(&config), TaxonomyClassifier::default())
            .score_with(&record("Glow", None), ScoringProfile::Keyword);
        assert_eq!(glow_only.score, 70);
    }

    #[test]
    fn test_adding_primary_keyword_never_lowers_score() {
        let scorer = scorer();
        let bases = [
            "Glow",
            "Glow Hair Salon",
            "Bright Smiles Pediatric",
            "Downtown Urgent Care",
            "Nail Studio",
        ];
        for base in bases {
            for category in Category::TARGETS {
                for keyword in crate::constants::default_primary_keywords(category) {
                    let before = scorer.score(&record(base, Some("laser, licensed")));
                    let after = scorer.score(&record(&format!("{} {}", base, keyword), Some("laser, licensed")));
                    assert!(
                        after.score >= before.score,
                        "'{}' + '{}' went from {} to {}",
                        base,
                        keyword,
                        before.score,
                        after.score
                    );
                }
            }
        }
    }

    #[test]
    fn test_scores_stay_bounded_under_extreme_weights() {
        let config = ScoringConfig {
            keyword_base: 90,
            primary: vec![PrimaryKeywords {
                category: Category::MedSpa,
                keywords: vec!["spa".into()],
                weight: 500,
            }],
            exclusions: vec![ExclusionRule {
                phrase: "closed".into(),
                penalty: 1_000,
                except_category: None,
            }],
            ..ScoringConfig::default()
        };
        let scorer = ConfidenceScorer::new(RuleTable::from_config(&config), TaxonomyClassifier::default());
        for (name, description) in [("Spa", None), ("Closed", None), ("Spa", Some("closed")), ("", Some(""))] {
            let score = scorer.score(&record(name, description)).score;
            assert!((0..=100).contains(&score), "{} out of range", score);
        }
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::from_score(70, 70, 40), Tier::High);
        assert_eq!(Tier::from_score(69, 70, 40), Tier::Medium);
        assert_eq!(Tier::from_score(40, 70, 40), Tier::Medium);
        assert_eq!(Tier::from_score(39, 70, 40), Tier::Low);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::constants::default_primary_keywords;
    use crate::pipeline::processing::arbitrary::{arb_record, arb_scoring_config, arb_taxonomy, arb_text};
    use proptest::prelude::*;

    fn arb_profile() -> impl Strategy<Value = ScoringProfile> {
        prop_oneof![Just(ScoringProfile::Registry), Just(ScoringProfile::Keyword)]
    }

    fn all_primary_keywords() -> Vec<&'static str> {
        Category::TARGETS
            .iter()
            .flat_map(|category| default_primary_keywords(*category).iter().copied())
            .collect()
    }

    fn reasons_sorted(result: &ScoreResult) -> Vec<String> {
        let mut reasons: Vec<String> = result.reasons.iter().map(|r| format!("{:?}", r)).collect();
        reasons.sort();
        reasons
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_explained(
            config in arb_scoring_config(),
            record in arb_record(),
            profile in arb_profile(),
        ) {
            let scorer = ConfidenceScorer::new(RuleTable::from_config(&config), TaxonomyClassifier::default());
            let result = scorer.score_with(&record, profile);
            prop_assert!((SCORE_FLOOR..=SCORE_CEILING).contains(&result.score));
            prop_assert_eq!(result.reasons.iter().map(|r| r.delta).sum::<i32>(), result.score);
            prop_assert_eq!(result.tier, scorer.table().tier(result.score));
        }

        #[test]
        fn any_rule_order_gives_the_same_score(
            config in arb_scoring_config(),
            record in arb_record(),
            profile in arb_profile(),
            rotation in 0usize..64,
        ) {
            let table = RuleTable::from_config(&config);
            let mut reordered = table.clone();
            reordered.rules.reverse();
            if !reordered.rules.is_empty() {
                let by = rotation % reordered.rules.len();
                reordered.rules.rotate_left(by);
            }

            let a = ConfidenceScorer::new(table, TaxonomyClassifier::default()).score_with(&record, profile);
            let b = ConfidenceScorer::new(reordered, TaxonomyClassifier::default()).score_with(&record, profile);
            prop_assert_eq!(a.score, b.score);
            prop_assert_eq!(reasons_sorted(&a), reasons_sorted(&b));
        }

        #[test]
        fn adding_a_primary_keyword_never_lowers_the_score(
            name in arb_text(3),
            description in prop::option::of(arb_text(4)),
            taxonomies in prop::collection::vec(arb_taxonomy(), 0..2),
            keyword in prop::sample::select(all_primary_keywords()),
        ) {
            let scorer = ConfidenceScorer::default();
            let mut before = CanonicalRecord::new(crate::types::RecordId::Derived("x".into()), &name);
            before.description = description;
            before.taxonomies = taxonomies;
            let mut after = before.clone();
            after.name = format!("{} {}", name, keyword);

            let (before, after) = (scorer.score(&before), scorer.score(&after));
            prop_assert!(
                after.score >= before.score,
                "'{}' + '{}' went from {} to {}",
                name,
                keyword,
                before.score,
                after.score
            );
        }
    }
}
