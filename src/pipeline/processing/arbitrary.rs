//! proptest generators for canonical records and scoring tables

use proptest::prelude::*;

use crate::config::{ExclusionRule, PrimaryKeywords, ScoringConfig};
use crate::types::{Address, AlternateId, CanonicalRecord, Category, RecordId, TaxonomyEntry};

/// Words that hit keyword, service, professional and exclusion rules, plus filler
pub const WORDS: &[&str] = &[
    "glow",
    "med spa",
    "medical spa",
    "aesthetic",
    "dental",
    "dentistry",
    "dermatology",
    "skin care",
    "plastic surgery",
    "cosmetic surgery",
    "botox",
    "laser",
    "veneers",
    "licensed",
    "board certified",
    "md",
    "pediatric",
    "hospital",
    "urgent care",
    "animal",
    "nail",
    "hair salon",
    "clinic",
    "studio",
    "llc",
];

pub const CODES: &[&str] = &[
    "207N00000X",
    "207ND0101X",
    "1223G0001X",
    "1223p0221x",
    "122300000X",
    "208200000X",
    "207YS0123X",
    "363LF0000X",
    "261QD0000X",
    "207Q00000X",
    "",
    "  ",
];

const STREETS: &[&str] = &["1 Main St", "22 Park Ave", "5 Oak Ave", ""];
const CITIES: &[&str] = &["Austin", "New York", "Miami"];
const SOURCES: &[&str] = &[
    "registry:taxonomy:Dentist",
    "registry:keyword:med spa",
    "registry:postal:10021",
    "search:keyword:laser",
];

pub fn arb_text(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..=max_words).prop_map(|words| words.join(" "))
}

pub fn arb_id() -> impl Strategy<Value = RecordId> {
    prop_oneof![
        (0u8..4).prop_map(|n| RecordId::External(format!("100000000{}", n))),
        (0u8..2).prop_map(|n| RecordId::Derived(format!("{:064x}", n))),
    ]
}

pub fn arb_address() -> impl Strategy<Value = Address> {
    (
        prop::sample::select(STREETS),
        prop::option::of(Just("Suite 200".to_string())),
        prop::sample::select(CITIES),
        "[A-Z]{2}",
        "[0-9]{5}",
    )
        .prop_map(|(line1, line2, city, state, postal_code)| Address {
            line1: line1.to_string(),
            line2,
            city: city.to_string(),
            state,
            postal_code,
            country_code: None,
        })
}

pub fn arb_taxonomy() -> impl Strategy<Value = TaxonomyEntry> {
    (prop::sample::select(CODES), any::<bool>()).prop_map(|(code, primary)| TaxonomyEntry {
        code: code.to_string(),
        description: String::new(),
        primary,
    })
}

fn arb_alternate_id() -> impl Strategy<Value = AlternateId> {
    ("[0-9]{4}", prop::option::of("[A-Z]{2}")).prop_map(|(value, state)| AlternateId {
        kind: "state_license".to_string(),
        value,
        issuer: None,
        state,
    })
}

fn arb_source() -> impl Strategy<Value = String> {
    prop::sample::select(SOURCES).prop_map(str::to_string)
}

pub fn arb_record_with_id(id: RecordId) -> impl Strategy<Value = CanonicalRecord> {
    (
        arb_text(4),
        prop::option::of(arb_text(6)),
        prop::option::of(arb_address()),
        prop::option::of(arb_address()),
        prop::option::of("[0-9]{3}-555-[0-9]{4}"),
        prop::option::of("[0-9]{3}-555-[0-9]{4}"),
        prop::option::of(Just("https://provider.test".to_string())),
        prop::collection::vec(arb_taxonomy(), 0..4),
        prop::collection::vec(arb_alternate_id(), 0..3),
        prop::collection::vec(arb_text(2), 0..3),
        prop::collection::vec(arb_source(), 0..3),
    )
        .prop_map(
            move |(
                name,
                description,
                practice_address,
                mailing_address,
                phone,
                fax,
                website,
                taxonomies,
                alternate_ids,
                alternate_names,
                sources,
            )| {
                let mut record = CanonicalRecord::new(id.clone(), &name);
                record.description = description;
                record.practice_address = practice_address;
                record.mailing_address = mailing_address;
                record.phone = phone;
                record.fax = fax;
                record.website = website;
                record.taxonomies = taxonomies;
                record.alternate_ids = alternate_ids;
                record.alternate_names = alternate_names;
                record.sources = sources;
                record
            },
        )
}

pub fn arb_record() -> impl Strategy<Value = CanonicalRecord> {
    arb_id().prop_flat_map(arb_record_with_id)
}

/// Two sightings of the same entity
pub fn arb_record_pair() -> impl Strategy<Value = (CanonicalRecord, CanonicalRecord)> {
    arb_id().prop_flat_map(|id| (arb_record_with_id(id.clone()), arb_record_with_id(id)))
}

fn arb_primary() -> impl Strategy<Value = PrimaryKeywords> {
    (
        prop::sample::select(Category::TARGETS.to_vec()),
        prop::collection::vec(prop::sample::select(WORDS).prop_map(str::to_string), 1..3),
        0i32..200,
    )
        .prop_map(|(category, keywords, weight)| PrimaryKeywords {
            category,
            keywords,
            weight,
        })
}

fn arb_exclusion() -> impl Strategy<Value = ExclusionRule> {
    (
        prop::sample::select(WORDS),
        0i32..500,
        prop::option::of(prop::sample::select(Category::TARGETS.to_vec())),
    )
        .prop_map(|(phrase, penalty, except_category)| ExclusionRule {
            phrase: phrase.to_string(),
            penalty,
            except_category,
        })
}

/// Rule tables with extreme weights and repeated categories
pub fn arb_scoring_config() -> impl Strategy<Value = ScoringConfig> {
    (
        0i32..=100,
        0i32..=100,
        prop::collection::vec(arb_primary(), 0..6),
        0i32..60,
        0i32..60,
        0i32..60,
        prop::collection::vec(arb_exclusion(), 0..5),
    )
        .prop_map(
            |(registry_base, keyword_base, primary, service_weight, taxonomy_weight, professional_bonus, exclusions)| {
                ScoringConfig {
                    registry_base,
                    keyword_base,
                    primary,
                    service_weight,
                    taxonomy_weight,
                    professional_bonus,
                    exclusions,
                    ..ScoringConfig::default()
                }
            },
        )
}
