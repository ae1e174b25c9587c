use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::{Result, ScoutError};
use crate::types::{Category, Jurisdiction, SourceKind, StrategyKind};

/// Everything a discovery run needs, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub jurisdictions: Vec<Jurisdiction>,
    #[serde(default)]
    pub strategies: StrategyConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub page_size: u32,
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// In-flight requests allowed toward the registry across all plans
    pub concurrency: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: constants::NPI_REGISTRY_URL.to_string(),
            page_size: constants::DEFAULT_PAGE_SIZE,
            request_delay_ms: constants::DEFAULT_REQUEST_DELAY_MS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            concurrency: 2,
            max_retries: 0,
            retry_backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl RegistryConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Optional free-text places search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    /// Name of the environment variable holding the API key, if any
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_search_page_size")]
    pub page_size: u32,
    #[serde(default = "default_search_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_retry_backoff_ms() -> u64 {
    constants::DEFAULT_RETRY_BACKOFF_MS
}

fn default_search_page_size() -> u32 {
    20
}

fn default_search_delay_ms() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard cap on the size of the generated plan set
    pub max_plans: usize,
    /// Plans paged concurrently
    pub max_workers: usize,
    pub plan_deadline_secs: u64,
    pub max_offset: MaxOffsetConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_plans: constants::DEFAULT_MAX_PLANS,
            max_workers: constants::DEFAULT_MAX_WORKERS,
            plan_deadline_secs: constants::DEFAULT_PLAN_DEADLINE_SECS,
            max_offset: MaxOffsetConfig::default(),
        }
    }
}

impl LimitsConfig {
    pub fn plan_deadline(&self) -> Duration {
        Duration::from_secs(self.plan_deadline_secs)
    }
}

/// Safety ceiling on the pagination offset for each strategy kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxOffsetConfig {
    pub taxonomy: u32,
    pub keyword: u32,
    pub postal: u32,
    pub official_name: u32,
}

impl Default for MaxOffsetConfig {
    fn default() -> Self {
        Self {
            taxonomy: constants::DEFAULT_TAXONOMY_MAX_OFFSET,
            keyword: constants::DEFAULT_KEYWORD_MAX_OFFSET,
            postal: constants::DEFAULT_POSTAL_MAX_OFFSET,
            official_name: constants::DEFAULT_OFFICIAL_NAME_MAX_OFFSET,
        }
    }
}

impl MaxOffsetConfig {
    pub fn for_kind(&self, kind: StrategyKind) -> u32 {
        match kind {
            StrategyKind::Taxonomy => self.taxonomy,
            StrategyKind::Keyword => self.keyword,
            StrategyKind::Postal => self.postal,
            StrategyKind::OfficialName => self.official_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub enabled: Vec<StrategyKind>,
    /// Taxonomy descriptions sent to the registry
    pub taxonomies: Vec<String>,
    pub keywords: Vec<String>,
    /// Authorized-official surname patterns
    pub official_surnames: Vec<String>,
    pub keyword_source: SourceKind,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                StrategyKind::Taxonomy,
                StrategyKind::Keyword,
                StrategyKind::Postal,
                StrategyKind::OfficialName,
            ],
            taxonomies: to_strings(constants::DEFAULT_TAXONOMY_DESCRIPTIONS),
            keywords: to_strings(constants::DEFAULT_KEYWORDS),
            official_surnames: Vec::new(),
            keyword_source: SourceKind::Registry,
        }
    }
}

impl StrategyConfig {
    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        self.enabled.contains(&kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCodes {
    pub category: Category,
    /// Taxonomy code prefixes; a full code matches exactly
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub categories: Vec<CategoryCodes>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            categories: Category::TARGETS
                .iter()
                .map(|category| CategoryCodes {
                    category: *category,
                    codes: to_strings(constants::default_category_codes(*category)),
                })
                .filter(|table| !table.codes.is_empty())
                .collect(),
        }
    }
}

/// Which base score a record starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSelection {
    Registry,
    Keyword,
    /// Registry profile for records with taxonomy entries, keyword profile otherwise
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeywords {
    pub category: Category,
    pub keywords: Vec<String>,
    #[serde(default = "default_primary_weight")]
    pub weight: i32,
}

fn default_primary_weight() -> i32 {
    constants::PRIMARY_KEYWORD_WEIGHT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub phrase: String,
    pub penalty: i32,
    #[serde(default)]
    pub except_category: Option<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub profile: ProfileSelection,
    pub registry_base: i32,
    pub keyword_base: i32,
    pub primary: Vec<PrimaryKeywords>,
    pub service_keywords: Vec<String>,
    pub service_weight: i32,
    pub aesthetic_taxonomy_codes: Vec<String>,
    pub taxonomy_weight: i32,
    pub professional_phrases: Vec<String>,
    pub professional_bonus: i32,
    pub exclusions: Vec<ExclusionRule>,
    pub high_threshold: i32,
    pub medium_threshold: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            profile: ProfileSelection::Auto,
            registry_base: constants::REGISTRY_BASE_SCORE,
            keyword_base: constants::KEYWORD_BASE_SCORE,
            primary: Category::TARGETS
                .iter()
                .map(|category| PrimaryKeywords {
                    category: *category,
                    keywords: to_strings(constants::default_primary_keywords(*category)),
                    weight: constants::PRIMARY_KEYWORD_WEIGHT,
                })
                .collect(),
            service_keywords: to_strings(constants::DEFAULT_SERVICE_KEYWORDS),
            service_weight: constants::SERVICE_KEYWORD_WEIGHT,
            aesthetic_taxonomy_codes: to_strings(constants::DEFAULT_AESTHETIC_TAXONOMY_CODES),
            taxonomy_weight: constants::AESTHETIC_TAXONOMY_WEIGHT,
            professional_phrases: to_strings(constants::DEFAULT_PROFESSIONAL_PHRASES),
            professional_bonus: constants::PROFESSIONAL_BONUS,
            exclusions: constants::DEFAULT_EXCLUSIONS
                .iter()
                .map(|(phrase, penalty, except)| ExclusionRule {
                    phrase: phrase.to_string(),
                    penalty: *penalty,
                    except_category: *except,
                })
                .collect(),
            high_threshold: constants::HIGH_TIER_THRESHOLD,
            medium_threshold: constants::MEDIUM_TIER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub min_score: i32,
    pub include_unclassified: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            min_score: constants::DEFAULT_MIN_EXPORT_SCORE,
            include_unclassified: false,
        }
    }
}

impl Config {
    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScoutError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Startup checks; every failure here is fatal before any network call
    pub fn validate(&self) -> Result<()> {
        if self.jurisdictions.is_empty() {
            return Err(ScoutError::config("at least one jurisdiction is required"));
        }
        if let Some(blank) = self.jurisdictions.iter().find(|j| j.state.trim().is_empty()) {
            return Err(ScoutError::config(format!(
                "jurisdiction '{}' has an empty state",
                blank.label()
            )));
        }
        if self.registry.page_size == 0 {
            return Err(ScoutError::config("registry.page_size must be greater than zero"));
        }
        if self.registry.page_size > constants::NPI_MAX_PAGE_SIZE {
            return Err(ScoutError::config(format!(
                "registry.page_size {} exceeds the registry maximum of {}",
                self.registry.page_size,
                constants::NPI_MAX_PAGE_SIZE
            )));
        }
        self.validate_registry_offsets()?;
        if self.registry.concurrency == 0 {
            return Err(ScoutError::config("registry.concurrency must be greater than zero"));
        }
        if let Some(search) = &self.search {
            if search.page_size == 0 {
                return Err(ScoutError::config("search.page_size must be greater than zero"));
            }
            if search.endpoint.trim().is_empty() {
                return Err(ScoutError::config("search.endpoint must not be empty"));
            }
        }
        if self.strategies.keyword_source == SourceKind::Search && self.search.is_none() {
            return Err(ScoutError::config(
                "strategies.keyword_source is 'search' but no [search] section is configured",
            ));
        }
        if self.limits.max_workers == 0 {
            return Err(ScoutError::config("limits.max_workers must be greater than zero"));
        }
        if self.limits.max_plans == 0 {
            return Err(ScoutError::config("limits.max_plans must be greater than zero"));
        }
        self.validate_scoring()
    }

    /// The registry rejects `skip` beyond its ceiling, so a larger cap would end plans as failures
    fn validate_registry_offsets(&self) -> Result<()> {
        let registry_kinds = [
            StrategyKind::Taxonomy,
            StrategyKind::Keyword,
            StrategyKind::Postal,
            StrategyKind::OfficialName,
        ];
        for kind in registry_kinds {
            if kind == StrategyKind::Keyword && self.strategies.keyword_source != SourceKind::Registry {
                continue;
            }
            let offset = self.limits.max_offset.for_kind(kind);
            if offset > constants::NPI_MAX_SKIP {
                return Err(ScoutError::config(format!(
                    "limits.max_offset.{} = {} exceeds the registry skip limit of {}",
                    kind.as_str(),
                    offset,
                    constants::NPI_MAX_SKIP
                )));
            }
        }
        Ok(())
    }

    fn validate_scoring(&self) -> Result<()> {
        let scoring = &self.scoring;
        let in_range = |v: i32| (constants::SCORE_FLOOR..=constants::SCORE_CEILING).contains(&v);
        if !in_range(scoring.high_threshold) || !in_range(scoring.medium_threshold) {
            return Err(ScoutError::config("score thresholds must be within 0..=100"));
        }
        if scoring.high_threshold < scoring.medium_threshold {
            return Err(ScoutError::config(
                "scoring.high_threshold must not be below scoring.medium_threshold",
            ));
        }
        if !in_range(self.assembly.min_score) {
            return Err(ScoutError::config("assembly.min_score must be within 0..=100"));
        }
        if scoring.primary.iter().any(|p| p.weight < 0)
            || scoring.service_weight < 0
            || scoring.taxonomy_weight < 0
            || scoring.professional_bonus < 0
        {
            return Err(ScoutError::config("positive scoring weights must not be negative"));
        }
        if scoring.exclusions.iter().any(|e| e.penalty < 0) {
            return Err(ScoutError::config("exclusion penalties are subtracted and must not be negative"));
        }
        // An exclusion hidden inside a primary keyword must exempt that keyword's category,
        // otherwise adding the keyword could lower the score.
        for primary in &scoring.primary {
            for keyword in &primary.keywords {
                let keyword = keyword.to_lowercase();
                for exclusion in &scoring.exclusions {
                    if keyword.contains(&exclusion.phrase.to_lowercase())
                        && exclusion.except_category != Some(primary.category)
                    {
                        return Err(ScoutError::config(format!(
                            "primary keyword '{}' ({}) contains exclusion phrase '{}'",
                            keyword, primary.category, exclusion.phrase
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
