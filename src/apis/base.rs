use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::MaxOffsetConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::rate_limiter::RateLimiter;
use crate::types::{Cursor, QueryPlan, RawRecord, SourceKind};

/// An upstream that can answer one page of a query plan
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    fn source_kind(&self) -> SourceKind;

    /// Fetch at most `limit` records starting at `offset`
    async fn fetch(&self, plan: &QueryPlan, offset: u32, limit: u32) -> Result<Vec<RawRecord>>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Zero keeps the baseline behaviour: a failed page ends the plan
    pub max_retries: u32,
    /// Linear backoff step between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(crate::constants::DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub page_size: u32,
    pub max_offset: MaxOffsetConfig,
    pub retry: RetryPolicy,
    pub plan_deadline: Duration,
}

/// One page of results and the cursor of the page after it, if any
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub next: Option<Cursor>,
    /// True when a full page was returned but the safety cap stopped pagination
    pub capped: bool,
}

/// How the page sequence of a plan ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// A short page signalled the end of results
    Exhausted,
    /// The offset ceiling for the strategy was reached
    Capped,
    /// Transport or parse failure; remaining pages were skipped
    Failed(String),
    DeadlineExceeded,
}

impl PlanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanOutcome::Exhausted => "exhausted",
            PlanOutcome::Capped => "capped",
            PlanOutcome::Failed(_) => "failed",
            PlanOutcome::DeadlineExceeded => "deadline_exceeded",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PlanOutcome::Failed(_) | PlanOutcome::DeadlineExceeded)
    }
}

/// Paginated, rate limited access to a single upstream
pub struct RegistryClient {
    source: Arc<dyn PageSource>,
    limiter: RateLimiter,
    settings: PaginationSettings,
}

impl RegistryClient {
    pub fn new(source: Arc<dyn PageSource>, limiter: RateLimiter, settings: PaginationSettings) -> Self {
        Self {
            source,
            limiter,
            settings,
        }
    }

    /// Fetch the page at `cursor`, retrying per the retry policy.
    #[instrument(skip(self, plan), fields(plan = %plan.label(), offset = cursor.offset()))]
    pub async fn fetch_page(&self, plan: &QueryPlan, cursor: Cursor) -> Result<Page> {
        let page_size = self.settings.page_size;
        let source = self.source.source_kind().as_str();
        let mut attempt: u32 = 0;

        loop {
            let permit = self.limiter.acquire().await;
            let started = std::time::Instant::now();
            let result = self.source.fetch(plan, cursor.offset(), page_size).await;
            drop(permit);

            match result {
                Ok(records) => {
                    metrics::registry::page_fetched(source);
                    metrics::registry::records_received(records.len());
                    metrics::registry::request_duration(started.elapsed().as_secs_f64());
                    debug!(records = records.len(), "Fetched page");
                    return Ok(self.page_from(plan, cursor, records));
                }
                Err(e) if attempt < self.settings.retry.max_retries => {
                    attempt += 1;
                    metrics::registry::retry();
                    warn!(attempt, error = %e, "Page fetch failed, retrying");
                    tokio::time::sleep(self.settings.retry.backoff * attempt).await;
                }
                Err(e) => {
                    metrics::registry::page_failed(source);
                    return Err(e);
                }
            }
        }
    }

    fn page_from(&self, plan: &QueryPlan, cursor: Cursor, records: Vec<RawRecord>) -> Page {
        let page_size = self.settings.page_size;
        // A short page is the end; a full one means more may remain
        if (records.len() as u64) < page_size as u64 {
            return Page {
                records,
                next: None,
                capped: false,
            };
        }

        let next = cursor.advance(page_size);
        let ceiling = self.settings.max_offset.for_kind(plan.kind);
        if next.offset() > ceiling || next == cursor {
            Page {
                records,
                next: None,
                capped: true,
            }
        } else {
            Page {
                records,
                next: Some(next),
                capped: false,
            }
        }
    }

    /// Lazy page sequence for `plan`, bounded by the plan deadline and the safety cap
    pub fn pages<'a>(&'a self, plan: &'a QueryPlan) -> PlanPages<'a> {
        PlanPages::new(self, plan)
    }
}

/// Restartable, finite sequence of pages for one plan.
pub struct PlanPages<'a> {
    client: &'a RegistryClient,
    plan: &'a QueryPlan,
    cursor: Option<Cursor>,
    deadline: Instant,
    pages_fetched: u32,
    outcome: Option<PlanOutcome>,
}

impl<'a> PlanPages<'a> {
    fn new(client: &'a RegistryClient, plan: &'a QueryPlan) -> Self {
        Self {
            client,
            plan,
            cursor: Some(plan.cursor),
            deadline: Instant::now() + client.settings.plan_deadline,
            pages_fetched: 0,
            outcome: None,
        }
    }

    /// Next page of raw records, or `None` once the plan has ended
    pub async fn next_page(&mut self) -> Option<Vec<RawRecord>> {
        let cursor = self.cursor?;

        match tokio::time::timeout_at(self.deadline, self.client.fetch_page(self.plan, cursor)).await {
            Err(_) => {
                warn!(plan = %self.plan.label(), pages = self.pages_fetched, "Plan deadline exceeded");
                self.finish(PlanOutcome::DeadlineExceeded);
                None
            }
            Ok(Err(e)) => {
                warn!(plan = %self.plan.label(), offset = cursor.offset(), error = %e, "Page failed, ending plan");
                self.finish(PlanOutcome::Failed(e.to_string()));
                None
            }
            Ok(Ok(page)) => {
                self.pages_fetched += 1;
                self.cursor = page.next;
                if page.next.is_none() {
                    let outcome = if page.capped {
                        PlanOutcome::Capped
                    } else {
                        PlanOutcome::Exhausted
                    };
                    self.finish(outcome);
                }
                Some(page.records)
            }
        }
    }

    /// Start over from the plan's own cursor with a fresh deadline
    pub fn restart(&mut self) {
        self.cursor = Some(self.plan.cursor);
        self.deadline = Instant::now() + self.client.settings.plan_deadline;
        self.pages_fetched = 0;
        self.outcome = None;
    }

    pub fn outcome(&self) -> Option<&PlanOutcome> {
        self.outcome.as_ref()
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn finish(&mut self, outcome: PlanOutcome) {
        self.cursor = None;
        metrics::registry::plan_finished(outcome.as_str());
        info!(
            plan = %self.plan.label(),
            pages = self.pages_fetched,
            outcome = outcome.as_str(),
            "Plan finished"
        );
        self.outcome = Some(outcome);
    }
}
