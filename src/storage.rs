use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Result, ScoutError};
use crate::observability::metrics;
use crate::pipeline::assembler::ExportRow;

/// What a single upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// A row with the same identifier or the same name and address already exists
    Skipped,
}

/// Persistence collaborator for exported rows.
///
/// Implementations must be idempotent: re-inserting rows from an earlier run adds nothing.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upsert_record(&self, row: &ExportRow) -> Result<WriteOutcome>;
    async fn get_record(&self, id: &str) -> Result<Option<ExportRow>>;
    async fn count(&self) -> Result<usize>;
}

/// Per-batch persistence counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Write every row, logging and counting failures without aborting the batch
pub async fn persist_all(storage: &dyn Storage, rows: &[ExportRow]) -> PersistReport {
    let mut report = PersistReport::default();
    for row in rows {
        match storage.upsert_record(row).await {
            Ok(WriteOutcome::Inserted) => {
                report.inserted += 1;
                metrics::storage::inserted();
            }
            Ok(WriteOutcome::Skipped) => {
                report.skipped += 1;
                metrics::storage::skipped();
            }
            Err(e) => {
                warn!(id = %row.id, name = %row.name, error = %e, "Failed to persist record");
                report.failed += 1;
                metrics::storage::failed();
            }
        }
    }
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        failed = report.failed,
        "Persisted batch"
    );
    report
}

/// Natural key used when two rows carry different identifiers.
///
/// `None` when the row has no street or postal code: a bare name is not an identity.
fn natural_key(row: &ExportRow) -> Option<(String, String, String)> {
    let norm = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let key = (norm(&row.name), norm(&row.address), norm(&row.postal_code));
    if key.0.is_empty() || (key.1.is_empty() && key.2.is_empty()) {
        return None;
    }
    Some(key)
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, ExportRow>,
    natural_keys: HashSet<(String, String, String)>,
}

/// In-memory storage implementation for development/testing
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|e| ScoutError::Storage {
            message: format!("storage lock poisoned: {}", e),
        })
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_record(&self, row: &ExportRow) -> Result<WriteOutcome> {
        let mut tables = self.lock()?;
        let key = natural_key(row);
        let known_key = key.as_ref().is_some_and(|k| tables.natural_keys.contains(k));
        if tables.rows.contains_key(&row.id) || known_key {
            debug!(id = %row.id, "Row already stored");
            return Ok(WriteOutcome::Skipped);
        }
        if let Some(key) = key {
            tables.natural_keys.insert(key);
        }
        tables.rows.insert(row.id.clone(), row.clone());
        debug!(id = %row.id, name = %row.name, "Stored row");
        Ok(WriteOutcome::Inserted)
    }

    async fn get_record(&self, id: &str) -> Result<Option<ExportRow>> {
        Ok(self.lock()?.rows.get(id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.rows.len())
    }
}
