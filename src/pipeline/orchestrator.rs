use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::apis::{
    NpiRegistrySource, PageSource, PaginationSettings, PlacesSearchSource, PlanOutcome, RegistryClient, RetryPolicy,
};
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::assembler::{AssembledRecord, Assembler, ExportRow};
use crate::pipeline::processing::conflation::{RecordCollection, UpsertOutcome};
use crate::pipeline::processing::normalize::NormalizationRegistry;
use crate::pipeline::strategy;
use crate::rate_limiter::{Limits, RateLimiter};
use crate::storage::{persist_all, PersistReport, Storage};
use crate::types::{CanonicalRecord, QueryPlan, SourceKind};

const MERGE_CHANNEL_CAPACITY: usize = 1_024;

/// A plan that ended early, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFailure {
    pub plan: String,
    pub reason: String,
}

/// Summary of one discovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub plans_total: usize,
    pub plans_exhausted: usize,
    pub plans_capped: usize,
    pub plans_failed: usize,
    pub plans_deadline_exceeded: usize,
    /// Plans dropped by `limits.max_plans`
    pub plans_truncated: usize,
    pub pages_fetched: u64,
    pub raw_records: u64,
    pub unique_records: usize,
    pub merged_records: u64,
    pub exported_records: usize,
    pub failures: Vec<PlanFailure>,
    pub persistence: Option<PersistReport>,
}

impl RunReport {
    fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            plans_total: 0,
            plans_exhausted: 0,
            plans_capped: 0,
            plans_failed: 0,
            plans_deadline_exceeded: 0,
            plans_truncated: 0,
            pages_fetched: 0,
            raw_records: 0,
            unique_records: 0,
            merged_records: 0,
            exported_records: 0,
            failures: Vec::new(),
            persistence: None,
        }
    }

    fn record_plan(&mut self, summary: &PlanSummary) {
        self.pages_fetched += summary.pages as u64;
        self.raw_records += summary.records;
        match &summary.outcome {
            PlanOutcome::Exhausted => self.plans_exhausted += 1,
            PlanOutcome::Capped => self.plans_capped += 1,
            PlanOutcome::Failed(reason) => {
                self.plans_failed += 1;
                self.failures.push(PlanFailure {
                    plan: summary.label.clone(),
                    reason: reason.clone(),
                });
            }
            PlanOutcome::DeadlineExceeded => {
                self.plans_deadline_exceeded += 1;
                self.failures.push(PlanFailure {
                    plan: summary.label.clone(),
                    reason: "plan deadline exceeded".to_string(),
                });
            }
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    /// Every merged record, scored and sorted
    pub assembled: Vec<AssembledRecord>,
    /// The filtered export view
    pub rows: Vec<ExportRow>,
}

#[derive(Debug)]
struct PlanSummary {
    label: String,
    outcome: PlanOutcome,
    pages: u32,
    records: u64,
}

/// One discovery run: plans, paged fetches, merge, then assembly
pub struct DiscoveryRun {
    config: Config,
    clients: HashMap<SourceKind, RegistryClient>,
    normalizers: NormalizationRegistry,
    assembler: Assembler,
}

impl DiscoveryRun {
    /// Wire the HTTP sources named by the configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let registry: Arc<dyn PageSource> = Arc::new(NpiRegistrySource::new(
            &config.registry.base_url,
            Duration::from_secs(config.registry.request_timeout_secs),
        )?);
        let search: Option<Arc<dyn PageSource>> = match &config.search {
            Some(search) => Some(Arc::new(PlacesSearchSource::from_config(search)?)),
            None => None,
        };
        Ok(Self::with_sources(config, registry, search))
    }

    /// Wire explicit sources; each gets its own limiter shared by all plans routed to it
    pub fn with_sources(config: Config, registry: Arc<dyn PageSource>, search: Option<Arc<dyn PageSource>>) -> Self {
        let mut clients = HashMap::new();

        let registry_limiter = RateLimiter::new(Limits {
            min_interval: config.registry.request_delay(),
            concurrency: Some(config.registry.concurrency),
        });
        let registry_settings = PaginationSettings {
            page_size: config.registry.page_size,
            max_offset: config.limits.max_offset.clone(),
            retry: RetryPolicy {
                max_retries: config.registry.max_retries,
                backoff: Duration::from_millis(config.registry.retry_backoff_ms),
            },
            plan_deadline: config.limits.plan_deadline(),
        };
        clients.insert(
            SourceKind::Registry,
            RegistryClient::new(registry, registry_limiter, registry_settings),
        );

        if let (Some(source), Some(search)) = (search, &config.search) {
            let limiter = RateLimiter::new(Limits {
                min_interval: Duration::from_millis(search.request_delay_ms),
                concurrency: None,
            });
            let settings = PaginationSettings {
                page_size: search.page_size,
                max_offset: config.limits.max_offset.clone(),
                retry: RetryPolicy {
                    max_retries: search.max_retries,
                    backoff: Duration::from_millis(search.retry_backoff_ms),
                },
                plan_deadline: config.limits.plan_deadline(),
            };
            clients.insert(SourceKind::Search, RegistryClient::new(source, limiter, settings));
        }

        let assembler = Assembler::from_config(&config);
        Self {
            config,
            clients,
            normalizers: NormalizationRegistry::new(),
            assembler,
        }
    }

    pub fn with_assembler(mut self, assembler: Assembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Run every plan, merge, score once, and persist the export view when storage is given.
    ///
    /// Per-page and per-record failures are absorbed into the report; this never fails.
    #[instrument(skip(self, storage))]
    pub async fn execute(&self, storage: Option<&dyn Storage>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let mut report = RunReport::new(run_id, Utc::now());
        let plan_set = strategy::plans(&self.config);
        report.plans_total = plan_set.len();
        report.plans_truncated = plan_set.truncated;
        info!(%run_id, plans = plan_set.len(), "Starting discovery run");

        let (tx, mut rx) = mpsc::channel::<CanonicalRecord>(MERGE_CHANNEL_CAPACITY);
        let max_workers = self.config.limits.max_workers.max(1);
        let plans = &plan_set.plans;

        let workers = async move {
            let summaries: Vec<PlanSummary> = stream::iter(plans.iter())
                .map(|plan| {
                    let tx = tx.clone();
                    async move { self.run_plan(plan, tx).await }
                })
                .buffer_unordered(max_workers)
                .collect()
                .await;
            // Last sender goes away here, which lets the merger drain and stop
            drop(tx);
            summaries
        };

        // Single writer: the only code that touches the collection
        let merger = async move {
            let mut collection = RecordCollection::new();
            let mut merged: u64 = 0;
            while let Some(record) = rx.recv().await {
                if collection.upsert(record) == UpsertOutcome::Merged {
                    merged += 1;
                }
            }
            (collection, merged)
        };

        let (summaries, (collection, merged)) = tokio::join!(workers, merger);
        for summary in &summaries {
            report.record_plan(summary);
        }
        report.unique_records = collection.len();
        report.merged_records = merged;

        let assembled = self.assembler.assemble(collection.into_records());
        let rows = self.assembler.export_rows(&assembled);
        report.exported_records = rows.len();

        if let Some(storage) = storage {
            report.persistence = Some(persist_all(storage, &rows).await);
        }

        report.finished_at = Utc::now();
        info!(
            %run_id,
            unique = report.unique_records,
            exported = report.exported_records,
            failed_plans = report.failures.len(),
            "Discovery run finished"
        );

        RunOutcome {
            report,
            assembled,
            rows,
        }
    }

    async fn run_plan(&self, plan: &QueryPlan, tx: mpsc::Sender<CanonicalRecord>) -> PlanSummary {
        let label = plan.label();
        let Some(client) = self.clients.get(&plan.source) else {
            warn!(plan = %label, source = plan.source.as_str(), "No client configured for plan source");
            return PlanSummary {
                label,
                outcome: PlanOutcome::Failed(format!("no {} source configured", plan.source.as_str())),
                pages: 0,
                records: 0,
            };
        };

        let tag = plan.source_tag();
        let mut pages = client.pages(plan);
        let mut records: u64 = 0;
        'pages: while let Some(batch) = pages.next_page().await {
            for raw in &batch {
                let record = self.normalizers.normalize_tagged(raw, &tag);
                records += 1;
                if tx.send(record).await.is_err() {
                    warn!(plan = %label, "Merge channel closed, ending plan");
                    break 'pages;
                }
            }
        }

        PlanSummary {
            outcome: pages.outcome().cloned().unwrap_or(PlanOutcome::Exhausted),
            pages: pages.pages_fetched(),
            label,
            records,
        }
    }
}
