use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic scope that query plans are run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub state: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_codes: Vec<String>,
}

impl Jurisdiction {
    pub fn new(state: &str, city: Option<&str>) -> Self {
        Self {
            state: state.to_string(),
            city: city.map(str::to_string),
            postal_codes: Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        match &self.city {
            Some(city) => format!("{}, {}", city, self.state),
            None => self.state.clone(),
        }
    }
}

/// One dimension of search used to surface candidate entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Taxonomy,
    Keyword,
    Postal,
    OfficialName,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Taxonomy => "taxonomy",
            StrategyKind::Keyword => "keyword",
            StrategyKind::Postal => "postal",
            StrategyKind::OfficialName => "official_name",
        }
    }
}

/// Upstream a plan is routed to; also decides how its raw records are normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Registry,
    Search,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Registry => "registry",
            SourceKind::Search => "search",
        }
    }
}

/// Opaque pagination position. Registry pagination is offset based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cursor(u32);

impl Cursor {
    pub fn start() -> Self {
        Cursor(0)
    }

    pub fn at(offset: u32) -> Self {
        Cursor(offset)
    }

    pub fn offset(&self) -> u32 {
        self.0
    }

    pub fn advance(&self, by: u32) -> Self {
        Cursor(self.0.saturating_add(by))
    }
}

/// An immutable description of one query to page through
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryPlan {
    pub jurisdiction: Jurisdiction,
    pub kind: StrategyKind,
    pub value: String,
    pub source: SourceKind,
    pub cursor: Cursor,
}

impl QueryPlan {
    pub fn new(jurisdiction: Jurisdiction, kind: StrategyKind, value: &str, source: SourceKind) -> Self {
        Self {
            jurisdiction,
            kind,
            value: value.to_string(),
            source,
            cursor: Cursor::start(),
        }
    }

    /// Human readable label used in logs and failure reports
    pub fn label(&self) -> String {
        format!(
            "{} {}={} [{}]",
            self.jurisdiction.label(),
            self.kind.as_str(),
            self.value,
            self.source.as_str()
        )
    }

    /// Tag attached to every record this plan yields
    pub fn source_tag(&self) -> String {
        format!("{}:{}:{}", self.source.as_str(), self.kind.as_str(), self.value)
    }
}

/// A payload returned by a source for one entity. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceKind,
    pub payload: serde_json::Value,
}

impl RawRecord {
    pub fn new(source: SourceKind, payload: serde_json::Value) -> Self {
        Self { source, payload }
    }
}

/// Canonical identifier: the sole deduplication key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordId {
    /// Identifier issued by the upstream registry (an NPI number)
    External(String),
    /// Hex digest derived from name and first address line
    Derived(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::External(id) => write!(f, "{}", id),
            RecordId::Derived(digest) => write!(f, "syn:{}", digest),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country_code: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.line1.trim().is_empty()
            && self.city.trim().is_empty()
            && self.state.trim().is_empty()
            && self.postal_code.trim().is_empty()
    }

    /// Street lines joined for single-column export
    pub fn street(&self) -> String {
        match &self.line2 {
            Some(line2) if !line2.trim().is_empty() => format!("{} {}", self.line1, line2),
            _ => self.line1.clone(),
        }
    }

    pub fn one_line(&self) -> String {
        [self.street(), self.city.clone(), self.state.clone(), self.postal_code.clone()]
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub code: String,
    pub description: String,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlternateId {
    pub kind: String,
    pub value: String,
    pub issuer: Option<String>,
    pub state: Option<String>,
}

/// The normalized entity every strategy folds into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    pub practice_address: Option<Address>,
    pub mailing_address: Option<Address>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub website: Option<String>,
    pub authorized_official: Option<String>,
    pub taxonomies: Vec<TaxonomyEntry>,
    pub alternate_ids: Vec<AlternateId>,
    pub alternate_names: Vec<String>,
    pub sources: Vec<String>,
}

impl CanonicalRecord {
    pub fn new(id: RecordId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: None,
            practice_address: None,
            mailing_address: None,
            phone: None,
            fax: None,
            website: None,
            authorized_official: None,
            taxonomies: Vec::new(),
            alternate_ids: Vec::new(),
            alternate_names: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn taxonomy_codes(&self) -> impl Iterator<Item = &str> {
        self.taxonomies.iter().map(|t| t.code.as_str())
    }

    /// Lowercased name and description, the text keyword rules look at
    pub fn searchable_text(&self) -> String {
        let mut text = self.name.to_lowercase();
        if let Some(description) = &self.description {
            text.push(' ');
            text.push_str(&description.to_lowercase());
        }
        text
    }
}

/// Fixed set of target business categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dentist,
    Dermatologist,
    PlasticSurgeon,
    MedSpa,
    Unclassified,
}

impl Category {
    /// Every category except `Unclassified`, in table order
    pub const TARGETS: [Category; 4] = [
        Category::Dentist,
        Category::Dermatologist,
        Category::PlasticSurgeon,
        Category::MedSpa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dentist => "dentist",
            Category::Dermatologist => "dermatologist",
            Category::PlasticSurgeon => "plastic_surgeon",
            Category::MedSpa => "med_spa",
            Category::Unclassified => "unclassified",
        }
    }

    pub fn is_classified(&self) -> bool {
        *self != Category::Unclassified
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
