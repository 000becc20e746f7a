use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::models::conflict::ConflictRecord;
use crate::models::record::EntityRecord;
use crate::models::registry::entity_key;
use crate::repository::record::{ConflictRepository, RecordStore};
use crate::BibleError;

/// In-memory store for embedding and tests.
///
/// Counts writes so callers can observe that unchanged re-scans are no-ops.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, EntityRecord>>,
    conflicts: RwLock<Vec<ConflictRecord>>,
    record_writes: AtomicUsize,
    conflict_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write_record` calls so far.
    pub fn record_writes(&self) -> usize {
        self.record_writes.load(Ordering::SeqCst)
    }

    /// Number of `save_all` calls so far.
    pub fn conflict_writes(&self) -> usize {
        self.conflict_writes.load(Ordering::SeqCst)
    }

    /// Seed a record without counting it as a write.
    pub async fn insert(&self, entity: &str, record: EntityRecord) {
        self.records.write().await.insert(entity_key(entity), record);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_record(&self, entity: &str) -> Result<EntityRecord, BibleError> {
        Ok(self
            .records
            .read()
            .await
            .get(&entity_key(entity))
            .cloned()
            .unwrap_or_default())
    }

    async fn write_record(&self, entity: &str, record: &EntityRecord) -> Result<(), BibleError> {
        self.records
            .write()
            .await
            .insert(entity_key(entity), record.clone());
        self.record_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<(String, EntityRecord)>, BibleError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[async_trait]
impl ConflictRepository for MemoryStore {
    async fn load_all(&self) -> Result<Vec<ConflictRecord>, BibleError> {
        Ok(self.conflicts.read().await.clone())
    }

    async fn save_all(&self, conflicts: &[ConflictRecord]) -> Result<(), BibleError> {
        *self.conflicts.write().await = conflicts.to_vec();
        self.conflict_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
