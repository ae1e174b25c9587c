use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use provider_scout::apis::PageSource;
use provider_scout::config::Config;
use provider_scout::error::ScoutError;
use provider_scout::pipeline::processing::scoring::Tier;
use provider_scout::pipeline::DiscoveryRun;
use provider_scout::storage::{InMemoryStorage, Storage};
use provider_scout::types::{Category, QueryPlan, RawRecord, RecordId, SourceKind, StrategyKind};

/// Canned pages keyed by (strategy kind, value, offset). `None` is a transport failure.
struct MockSource {
    kind: SourceKind,
    pages: HashMap<(StrategyKind, String, u32), Option<Vec<Value>>>,
    slow: Option<(StrategyKind, Duration)>,
    calls: AtomicUsize,
}

impl MockSource {
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            pages: HashMap::new(),
            slow: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn page(mut self, kind: StrategyKind, value: &str, offset: u32, records: Vec<Value>) -> Self {
        self.pages.insert((kind, value.to_string(), offset), Some(records));
        self
    }

    fn failing(mut self, kind: StrategyKind, value: &str) -> Self {
        self.pages.insert((kind, value.to_string(), 0), None);
        self
    }

    fn slow(mut self, kind: StrategyKind, delay: Duration) -> Self {
        self.slow = Some((kind, delay));
        self
    }
}

#[async_trait]
impl PageSource for MockSource {
    fn source_kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, plan: &QueryPlan, offset: u32, _limit: u32) -> provider_scout::Result<Vec<RawRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((kind, delay)) = self.slow {
            if kind == plan.kind {
                tokio::time::sleep(delay).await;
            }
        }
        match self.pages.get(&(plan.kind, plan.value.clone(), offset)) {
            Some(Some(records)) => Ok(records
                .iter()
                .map(|payload| RawRecord::new(self.kind, payload.clone()))
                .collect()),
            Some(None) => Err(ScoutError::api("upstream returned 503")),
            None => Ok(Vec::new()),
        }
    }
}

fn npi(number: &str, name: &str, taxonomy: Option<&str>, phone: Option<&str>, website: Option<&str>) -> Value {
    let mut address = json!({
        "address_purpose": "LOCATION",
        "address_1": format!("{} MADISON AVE", number),
        "city": "NEW YORK",
        "state": "NY",
        "postal_code": "10021"
    });
    if let Some(phone) = phone {
        address["telephone_number"] = json!(phone);
    }
    let mut payload = json!({
        "number": number,
        "basic": { "organization_name": name },
        "addresses": [address],
        "taxonomies": taxonomy
            .map(|code| vec![json!({ "code": code, "desc": "", "primary": true })])
            .unwrap_or_default(),
    });
    if let Some(website) = website {
        payload["endpoints"] = json!([{ "endpointType": "WEB", "endpoint": website }]);
    }
    payload
}

const CONFIG: &str = r#"
[registry]
page_size = 2
request_delay_ms = 0

[limits]
max_workers = 4
plan_deadline_secs = 5

[[jurisdictions]]
state = "NY"
city = "New York"
postal_codes = ["10021"]

[strategies]
taxonomies = ["Dermatology"]
keywords = ["med spa"]
official_surnames = ["GARCIA"]
"#;

fn registry() -> MockSource {
    MockSource::new(SourceKind::Registry)
        .page(
            StrategyKind::Taxonomy,
            "Dermatology",
            0,
            vec![
                npi("1", "GLOW DERMATOLOGY PLLC", Some("207N00000X"), Some("212-555-0100"), None),
                npi("2", "CITY HOSPITAL DERMATOLOGY", Some("207N00000X"), None, None),
            ],
        )
        .page(
            StrategyKind::Taxonomy,
            "Dermatology",
            2,
            vec![npi("3", "SKIN CARE ASSOCIATES", Some("207ND0101X"), None, None)],
        )
        .page(
            StrategyKind::Keyword,
            "med spa",
            0,
            vec![npi("10", "MANHATTAN MEDICAL SPA", None, None, None)],
        )
        .page(
            StrategyKind::Postal,
            "10021",
            0,
            vec![
                npi("1", "GLOW DERMATOLOGY PLLC", Some("207N00000X"), None, Some("https://glow.example")),
                npi("10", "MANHATTAN MEDICAL SPA", None, None, Some("https://mms.example")),
            ],
        )
        .failing(StrategyKind::OfficialName, "GARCIA")
}

#[tokio::test]
async fn test_strategies_merge_into_unique_records() -> Result<()> {
    let config = Config::from_toml_str(CONFIG)?;
    let source = Arc::new(registry());
    let run = DiscoveryRun::with_sources(config, source.clone(), None);

    let outcome = run.execute(None).await;
    let report = &outcome.report;

    assert_eq!(report.plans_total, 4);
    assert_eq!(report.plans_exhausted, 3);
    assert_eq!(report.plans_failed, 1);
    // The full postal page costs one extra, empty request
    assert_eq!(report.pages_fetched, 5);
    assert_eq!(report.raw_records, 6);
    assert_eq!(report.unique_records, 4);
    assert_eq!(report.merged_records, 2);
    assert_eq!(source.calls.load(Ordering::SeqCst), 6);

    // The same NPI seen by two strategies exposes both fields
    let glow = outcome
        .assembled
        .iter()
        .find(|a| a.record.id == RecordId::External("1".into()))
        .expect("glow record");
    assert_eq!(glow.record.phone.as_deref(), Some("212-555-0100"));
    assert_eq!(glow.record.website.as_deref(), Some("https://glow.example"));
    assert_eq!(glow.record.sources.len(), 2);
    assert_eq!(glow.category, Category::Dermatologist);

    Ok(())
}

#[tokio::test]
async fn test_failed_plan_is_reported_not_fatal() -> Result<()> {
    let config = Config::from_toml_str(CONFIG)?;
    let run = DiscoveryRun::with_sources(config, Arc::new(registry()), None);
    let outcome = run.execute(None).await;

    assert_eq!(outcome.report.failures.len(), 1);
    let failure = &outcome.report.failures[0];
    assert!(failure.plan.contains("official_name=GARCIA"));
    assert!(failure.reason.contains("503"));
    assert!(!outcome.rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_export_is_sorted_and_filtered() -> Result<()> {
    let config = Config::from_toml_str(CONFIG)?;
    let run = DiscoveryRun::with_sources(config, Arc::new(registry()), None);
    let outcome = run.execute(None).await;

    let ids: Vec<&str> = outcome.rows.iter().map(|r| r.id.as_str()).collect();
    // Hospital record is scored but filtered out of the view
    assert_eq!(ids, vec!["10", "1", "3"]);
    assert_eq!(outcome.assembled.len(), 4);

    let spa = &outcome.rows[0];
    assert_eq!(spa.category, Category::MedSpa);
    assert_eq!(spa.score, 70);
    assert_eq!(spa.tier, Tier::High);
    let mut sources: Vec<&str> = spa.sources.split(';').collect();
    sources.sort();
    assert_eq!(sources, vec!["registry:keyword:med spa", "registry:postal:10021"]);
    assert_eq!(outcome.rows[1].score, 45);
    assert_eq!(outcome.rows[1].tier, Tier::Medium);
    Ok(())
}

#[tokio::test]
async fn test_worker_count_does_not_change_results() -> Result<()> {
    let serial = Config::from_toml_str(&CONFIG.replace("max_workers = 4", "max_workers = 1"))?;
    let parallel = Config::from_toml_str(CONFIG)?;

    let a = DiscoveryRun::with_sources(serial, Arc::new(registry()), None)
        .execute(None)
        .await;
    let b = DiscoveryRun::with_sources(parallel, Arc::new(registry()), None)
        .execute(None)
        .await;

    let ids = |rows: &[provider_scout::pipeline::ExportRow]| {
        rows.iter().map(|r| (r.id.clone(), r.score, r.phone.clone())).collect::<Vec<_>>()
    };
    assert_eq!(ids(&a.rows), ids(&b.rows));
    assert_ne!(a.report.run_id, b.report.run_id);
    Ok(())
}

#[tokio::test]
async fn test_rerun_against_same_storage_is_idempotent() -> Result<()> {
    let storage = InMemoryStorage::new();

    let first = DiscoveryRun::with_sources(Config::from_toml_str(CONFIG)?, Arc::new(registry()), None)
        .execute(Some(&storage as &dyn Storage))
        .await;
    let second = DiscoveryRun::with_sources(Config::from_toml_str(CONFIG)?, Arc::new(registry()), None)
        .execute(Some(&storage as &dyn Storage))
        .await;

    let first = first.report.persistence.expect("persistence report");
    let second = second.report.persistence.expect("persistence report");
    assert_eq!(first.inserted, 3);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(storage.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_plan_deadline_ends_only_that_plan() -> Result<()> {
    let config = Config::from_toml_str(&CONFIG.replace("plan_deadline_secs = 5", "plan_deadline_secs = 1"))?;
    let source = registry().slow(StrategyKind::Keyword, Duration::from_secs(3));
    let outcome = DiscoveryRun::with_sources(config, Arc::new(source), None)
        .execute(None)
        .await;

    assert_eq!(outcome.report.plans_deadline_exceeded, 1);
    assert!(outcome
        .report
        .failures
        .iter()
        .any(|f| f.plan.contains("keyword=med spa")));
    // The spa is still found through the postal plan
    assert!(outcome.rows.iter().any(|r| r.id == "10"));
    Ok(())
}

#[tokio::test]
async fn test_search_hits_collapse_by_name_and_address() -> Result<()> {
    let toml = format!(
        "{}\nkeyword_source = \"search\"\n\n[search]\nendpoint = \"http://localhost:9/search\"\npage_size = 10\nrequest_delay_ms = 0\n",
        CONFIG
    );
    let config = Config::from_toml_str(&toml)?;
    let search = MockSource::new(SourceKind::Search).page(
        StrategyKind::Keyword,
        "med spa",
        0,
        vec![
            json!({ "name": "Glow Med Spa", "address": "1 Park Ave, New York, NY 10016",
                    "snippet": "Licensed injectors. Botox and filler. Call (212) 555-0142" }),
            json!({ "title": "GLOW MED SPA", "formatted_address": "1 park ave, New York, NY 10016, USA",
                    "website": "https://glowmedspa.example" }),
        ],
    );

    let outcome = DiscoveryRun::with_sources(config, Arc::new(registry()), Some(Arc::new(search) as Arc<dyn PageSource>))
        .execute(None)
        .await;

    let spa = outcome
        .rows
        .iter()
        .find(|r| r.name == "Glow Med Spa")
        .expect("search hit exported");
    assert!(spa.id.starts_with("syn:"));
    assert_eq!(spa.phone, "(212) 555-0142");
    assert_eq!(spa.category, Category::MedSpa);
    // 40 base + 30 primary + 20 services + 5 professional
    assert_eq!(spa.score, 95);
    assert_eq!(
        outcome
            .assembled
            .iter()
            .filter(|a| a.record.name.eq_ignore_ascii_case("glow med spa"))
            .count(),
        1
    );
    Ok(())
}
