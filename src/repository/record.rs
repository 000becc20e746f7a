use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use surrealdb::Datetime;

use crate::db::connection::BibleDb;
use crate::models::conflict::ConflictRecord;
use crate::models::record::EntityRecord;
use crate::models::registry::entity_key;
use crate::BibleError;

/// Persistence for per-entity records.
///
/// Each call is atomic from the engine's point of view; callers serialize
/// read-modify-write sequences per entity.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read an entity's record. Missing records read as the default record.
    async fn read_record(&self, entity: &str) -> Result<EntityRecord, BibleError>;

    /// Replace an entity's record.
    async fn write_record(&self, entity: &str, record: &EntityRecord) -> Result<(), BibleError>;

    /// All stored records as (entity key, record), sorted by key.
    async fn list_records(&self) -> Result<Vec<(String, EntityRecord)>, BibleError>;
}

/// Persistence for the conflict log.
#[async_trait]
pub trait ConflictRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ConflictRecord>, BibleError>;

    async fn save_all(&self, conflicts: &[ConflictRecord]) -> Result<(), BibleError>;
}

/// Decode a stored record row; anything malformed reads as the default.
pub(crate) fn decode_record(entity: &str, row: serde_json::Value) -> EntityRecord {
    serde_json::from_value(row).unwrap_or_else(|e| {
        tracing::warn!("Malformed record for '{}', treating as empty: {}", entity, e);
        EntityRecord::default()
    })
}

/// Decode one conflict row. The conflict's own id is stored as
/// `conflict_id` since `id` belongs to the database.
pub(crate) fn decode_conflict(mut row: serde_json::Value) -> Option<ConflictRecord> {
    let object = row.as_object_mut()?;
    object.remove("seq");
    if let Some(id) = object.remove("conflict_id") {
        object.insert("id".to_string(), id);
    }
    match serde_json::from_value(row) {
        Ok(conflict) => Some(conflict),
        Err(e) => {
            tracing::warn!("Skipping malformed conflict row: {}", e);
            None
        }
    }
}

/// Row form of a conflict, in log order.
pub(crate) fn encode_conflict(seq: usize, conflict: &ConflictRecord) -> Result<serde_json::Value, BibleError> {
    let mut row = serde_json::to_value(conflict)?;
    if let Some(object) = row.as_object_mut() {
        if let Some(id) = object.remove("id") {
            object.insert("conflict_id".to_string(), id);
        }
        object.insert("seq".to_string(), seq.into());
    }
    Ok(row)
}

// ============================================================================
// SurrealDB implementation
// ============================================================================

/// SurrealDB-backed store: one `entity_record` row per entity, one
/// `conflict_record` row per logged conflict.
///
/// Rows are read loosely, so a hand-edited or outdated row degrades to an
/// empty record (or is skipped) instead of failing the scan.
pub struct SurrealStore {
    db: Arc<BibleDb>,
}

impl SurrealStore {
    pub fn new(db: Arc<BibleDb>) -> Self {
        Self { db }
    }
}

#[derive(Serialize)]
struct RecordRow {
    key: String,
    #[serde(flatten)]
    record: EntityRecord,
    updated_at: Datetime,
}

#[async_trait]
impl RecordStore for SurrealStore {
    async fn read_record(&self, entity: &str) -> Result<EntityRecord, BibleError> {
        let key = entity_key(entity);
        let mut result = self
            .db
            .query("SELECT * OMIT id, updated_at FROM type::thing('entity_record', $key)")
            .bind(("key", key.clone()))
            .await?;
        let rows: Vec<serde_json::Value> = result.take(0)?;

        Ok(rows
            .into_iter()
            .next()
            .map(|row| decode_record(&key, row))
            .unwrap_or_default())
    }

    async fn write_record(&self, entity: &str, record: &EntityRecord) -> Result<(), BibleError> {
        let key = entity_key(entity);
        let row = RecordRow {
            key: key.clone(),
            record: record.clone(),
            updated_at: Datetime::from(Utc::now()),
        };
        self.db
            .query("UPSERT type::thing('entity_record', $key) CONTENT $row RETURN NONE")
            .bind(("key", key))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<(String, EntityRecord)>, BibleError> {
        let mut result = self
            .db
            .query("SELECT * OMIT id, updated_at FROM entity_record ORDER BY key")
            .await?;
        let rows: Vec<serde_json::Value> = result.take(0)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let key = row.get("key")?.as_str()?.to_string();
                let record = decode_record(&key, row);
                Some((key, record))
            })
            .collect())
    }
}

#[async_trait]
impl ConflictRepository for SurrealStore {
    async fn load_all(&self) -> Result<Vec<ConflictRecord>, BibleError> {
        let mut result = self
            .db
            .query("SELECT * OMIT id FROM conflict_record ORDER BY seq")
            .await?;
        let rows: Vec<serde_json::Value> = result.take(0)?;

        Ok(rows.into_iter().filter_map(decode_conflict).collect())
    }

    async fn save_all(&self, conflicts: &[ConflictRecord]) -> Result<(), BibleError> {
        let rows = conflicts
            .iter()
            .enumerate()
            .map(|(seq, conflict)| encode_conflict(seq, conflict))
            .collect::<Result<Vec<_>, _>>()?;

        // the log is replaced as a whole
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE conflict_record; \
                 FOR $row IN $rows { CREATE conflict_record CONTENT $row RETURN NONE; }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("rows", rows))
            .await?
            .check()?;
        Ok(())
    }
}
