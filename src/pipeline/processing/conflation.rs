use std::collections::BTreeMap;

use tracing::debug;

use crate::observability::metrics;
use crate::types::{CanonicalRecord, RecordId};

/// What an upsert did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of this identifier
    Created,
    /// Folded into an existing record
    Merged,
}

/// Fold `incoming` into `existing`.
///
/// Populated scalars are never overwritten; empty ones are filled from `incoming`.
/// List fields become order-preserving unions, so merging the same record twice is a no-op.
pub fn merge(existing: &CanonicalRecord, incoming: &CanonicalRecord) -> CanonicalRecord {
    let mut merged = existing.clone();
    merge_into(&mut merged, incoming);
    merged
}

pub fn merge_into(existing: &mut CanonicalRecord, incoming: &CanonicalRecord) {
    if existing.name.trim().is_empty() && !incoming.name.trim().is_empty() {
        existing.name = incoming.name.clone();
    }
    fill(&mut existing.description, &incoming.description);
    fill(&mut existing.practice_address, &incoming.practice_address);
    fill(&mut existing.mailing_address, &incoming.mailing_address);
    fill(&mut existing.phone, &incoming.phone);
    fill(&mut existing.fax, &incoming.fax);
    fill(&mut existing.website, &incoming.website);
    fill(&mut existing.authorized_official, &incoming.authorized_official);

    union(&mut existing.taxonomies, &incoming.taxonomies);
    union(&mut existing.alternate_ids, &incoming.alternate_ids);
    union(&mut existing.alternate_names, &incoming.alternate_names);
    union(&mut existing.sources, &incoming.sources);
}

fn fill<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
    if slot.is_none() {
        *slot = incoming.clone();
    }
}

fn union<T: Clone + PartialEq>(existing: &mut Vec<T>, incoming: &[T]) {
    for item in incoming {
        if !existing.contains(item) {
            existing.push(item.clone());
        }
    }
}

/// The deduplicated record set of one run, keyed by canonical identifier.
///
/// Owned by a single writer; records are never removed during a run.
#[derive(Debug, Default)]
pub struct RecordCollection {
    records: BTreeMap<RecordId, CanonicalRecord>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: CanonicalRecord) -> UpsertOutcome {
        match self.records.get_mut(&record.id) {
            Some(existing) => {
                merge_into(existing, &record);
                debug!(id = %record.id, sources = existing.sources.len(), "Merged record");
                metrics::merge::record_merged();
                UpsertOutcome::Merged
            }
            None => {
                debug!(id = %record.id, name = %record.name, "New record");
                metrics::merge::record_created();
                self.records.insert(record.id.clone(), record);
                UpsertOutcome::Created
            }
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<&CanonicalRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records.into_values().collect()
    }
}
