use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::Config;
use crate::types::{Jurisdiction, QueryPlan, SourceKind, StrategyKind};

/// Generated plans plus how many the cap dropped from the tail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSet {
    pub plans: Vec<QueryPlan>,
    pub truncated: usize,
}

impl PlanSet {
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Build the query plans for a run.
///
/// Pure function of configuration. Order is deterministic: per jurisdiction, taxonomy plans,
/// then keyword, postal and official-name plans, each in configured order. Blank values are
/// skipped and repeated (jurisdiction, kind, value) triples are emitted once.
pub fn plans(config: &Config) -> PlanSet {
    let strategies = &config.strategies;
    let mut seen: HashSet<(Jurisdiction, StrategyKind, String)> = HashSet::new();
    let mut plans = Vec::new();

    for jurisdiction in &config.jurisdictions {
        let mut push = |kind: StrategyKind, value: &str, source: SourceKind| {
            let value = value.trim();
            if value.is_empty() || !strategies.is_enabled(kind) {
                return;
            }
            if seen.insert((jurisdiction.clone(), kind, value.to_lowercase())) {
                plans.push(QueryPlan::new(jurisdiction.clone(), kind, value, source));
            }
        };

        for taxonomy in &strategies.taxonomies {
            push(StrategyKind::Taxonomy, taxonomy, SourceKind::Registry);
        }
        for keyword in &strategies.keywords {
            push(StrategyKind::Keyword, keyword, strategies.keyword_source);
        }
        for postal_code in &jurisdiction.postal_codes {
            push(StrategyKind::Postal, postal_code, SourceKind::Registry);
        }
        for surname in &strategies.official_surnames {
            push(StrategyKind::OfficialName, surname, SourceKind::Registry);
        }
    }

    let max_plans = config.limits.max_plans;
    let truncated = plans.len().saturating_sub(max_plans);
    if truncated > 0 {
        warn!(
            generated = plans.len(),
            max_plans, truncated, "Plan set exceeds limits.max_plans, dropping the tail"
        );
        plans.truncate(max_plans);
    }
    info!(plans = plans.len(), jurisdictions = config.jurisdictions.len(), "Generated query plans");

    PlanSet { plans, truncated }
}
