//! Default values and lookup tables used when the configuration file leaves them out.
//!
//! Code tables use NUCC health care provider taxonomy codes. Matching is by prefix so a
//! family entry such as `1223` covers every dental specialty.

use crate::types::Category;

// Registry endpoint and limits
pub const NPI_REGISTRY_URL: &str = "https://npiregistry.cms.hhs.gov/api/";
pub const NPI_API_VERSION: &str = "2.1";
pub const NPI_MAX_PAGE_SIZE: u32 = 200;
/// Largest `skip` the registry accepts
pub const NPI_MAX_SKIP: u32 = 1_000;

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 200;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PLAN_DEADLINE_SECS: u64 = 120;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_MAX_PLANS: usize = 500;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

// Safety caps on the pagination offset, per strategy breadth
pub const DEFAULT_TAXONOMY_MAX_OFFSET: u32 = 1_000;
pub const DEFAULT_KEYWORD_MAX_OFFSET: u32 = 1_000;
pub const DEFAULT_POSTAL_MAX_OFFSET: u32 = 1_000;
pub const DEFAULT_OFFICIAL_NAME_MAX_OFFSET: u32 = 400;

// Score thresholds
pub const HIGH_TIER_THRESHOLD: i32 = 70;
pub const MEDIUM_TIER_THRESHOLD: i32 = 40;
pub const SCORE_FLOOR: i32 = 0;
pub const SCORE_CEILING: i32 = 100;
pub const DEFAULT_MIN_EXPORT_SCORE: i32 = 40;

// Scoring weights
pub const REGISTRY_BASE_SCORE: i32 = 0;
pub const KEYWORD_BASE_SCORE: i32 = 40;
pub const PRIMARY_KEYWORD_WEIGHT: i32 = 30;
pub const SERVICE_KEYWORD_WEIGHT: i32 = 10;
pub const AESTHETIC_TAXONOMY_WEIGHT: i32 = 15;
pub const PROFESSIONAL_BONUS: i32 = 5;
pub const STRONG_EXCLUSION_PENALTY: i32 = 50;
pub const EXCLUSION_PENALTY: i32 = 20;

pub fn default_category_codes(category: Category) -> &'static [&'static str] {
    match category {
        Category::Dentist => &["1223", "122400000X", "124Q00000X", "261QD0000X"],
        Category::Dermatologist => &["207N"],
        Category::PlasticSurgeon => &["2082", "207YS0123X"],
        Category::MedSpa => &[],
        Category::Unclassified => &[],
    }
}

pub fn default_primary_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Dentist => &["dental", "dentist", "dentistry", "orthodont", "endodont", "periodont"],
        Category::Dermatologist => &["dermatolog", "skin care", "skin clinic"],
        Category::PlasticSurgeon => &["plastic surg", "cosmetic surg", "aesthetic surg"],
        Category::MedSpa => &["med spa", "medspa", "medical spa", "aesthetic", "medical aesthetics"],
        Category::Unclassified => &[],
    }
}

pub const DEFAULT_SERVICE_KEYWORDS: &[&str] = &[
    "botox",
    "filler",
    "laser",
    "microneedling",
    "chemical peel",
    "coolsculpting",
    "hydrafacial",
    "prp",
    "juvederm",
    "dysport",
    "kybella",
    "iv therapy",
    "veneers",
    "implants",
    "invisalign",
    "teeth whitening",
];

/// Taxonomy families that signal aesthetic or cosmetic adjacent practice
pub const DEFAULT_AESTHETIC_TAXONOMY_CODES: &[&str] = &[
    "207N",       // Dermatology
    "2082",       // Plastic Surgery
    "207YS0123X", // Facial Plastic Surgery
    "363L",       // Nurse Practitioner
    "363A",       // Physician Assistant
    "163W",       // Registered Nurse
];

pub const DEFAULT_PROFESSIONAL_PHRASES: &[&str] = &[
    "licensed",
    "board certified",
    "board-certified",
    "medical director",
    "physician",
    " md",
    " dds",
    " dmd",
];

/// (phrase, penalty, category that is exempt from the penalty)
pub const DEFAULT_EXCLUSIONS: &[(&str, i32, Option<Category>)] = &[
    ("hospital", STRONG_EXCLUSION_PENALTY, None),
    ("urgent care", STRONG_EXCLUSION_PENALTY, None),
    ("veterinary", STRONG_EXCLUSION_PENALTY, None),
    ("animal", STRONG_EXCLUSION_PENALTY, None),
    ("pharmacy", EXCLUSION_PENALTY, None),
    ("laboratory", EXCLUSION_PENALTY, None),
    ("ambulance", STRONG_EXCLUSION_PENALTY, None),
    ("nursing home", STRONG_EXCLUSION_PENALTY, None),
    ("hair salon", EXCLUSION_PENALTY, None),
    ("nail", EXCLUSION_PENALTY, None),
    ("pediatric", EXCLUSION_PENALTY, Some(Category::Dentist)),
    ("dental", STRONG_EXCLUSION_PENALTY, Some(Category::Dentist)),
    ("orthodont", STRONG_EXCLUSION_PENALTY, Some(Category::Dentist)),
];

pub const DEFAULT_TAXONOMY_DESCRIPTIONS: &[&str] = &["Dentist", "Dermatology", "Plastic Surgery"];
pub const DEFAULT_KEYWORDS: &[&str] = &["med spa", "medspa", "aesthetics", "laser"];
