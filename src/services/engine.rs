//! The continuity engine: scan entry points and conflict resolution.
//!
//! Extraction is synchronous and pure. Every entity read-merge-write goes
//! through the per-entity [`EntityQueue`]; every conflict-log read-merge-write
//! goes through a single log lock. The two are never held together.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::extraction::tier1::Tier1Extractor;
use crate::extraction::tier2::{merge_tier2, opted_in_entities};
use crate::models::conflict::{ConflictKey, ConflictRecord};
use crate::models::fact::{EntityFacts, ExtractedFact, LOCATION_ATTRIBUTE};
use crate::models::record::{DismissedConflict, EntityRecord, StoredAttribute};
use crate::models::registry::Registry;
use crate::models::scene::SceneDocument;
use crate::repository::{ConflictRepository, DocumentSource, RecordStore};
use crate::services::classifier::{AnthropicClassifier, AttributeClassifier, ClassifierRequest};
use crate::services::conflicts::{ConflictLog, MergeSummary};
use crate::services::reconcile::{reconcile, refresh_override_rows, Change};
use crate::services::serializer::EntityQueue;
use crate::BibleError;

// ============================================================================
// Reports
// ============================================================================

/// Outcome of scanning one scene.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub scene: String,
    /// Canonical names of entities that appear in the scene
    pub appearances: Vec<String>,
    pub changes: Vec<Change>,
    /// Conflicts detected by this scan (before log dedup)
    pub conflicts: Vec<ConflictRecord>,
    pub merge: MergeSummary,
    pub windows_scanned: usize,
    pub tier2_facts: usize,
    /// Entities whose record could not be read or written
    pub failures: Vec<ScanFailure>,
}

/// A unit of work that failed without aborting its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    /// Scene identifier or entity name
    pub subject: String,
    pub error: String,
}

/// Outcome of scanning a whole corpus.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusReport {
    pub documents_scanned: usize,
    /// Entity → scenes it appears in, in scan order
    pub appearances: BTreeMap<String, Vec<String>>,
    pub changes: Vec<Change>,
    pub conflicts: Vec<ConflictRecord>,
    pub merge: MergeSummary,
    pub document_failures: Vec<ScanFailure>,
    pub entity_failures: Vec<ScanFailure>,
}

/// Facts gathered for one entity across a corpus.
#[derive(Debug, Default)]
struct CorpusFacts {
    /// First observation per attribute, in discovery order
    attributes: Vec<ExtractedFact>,
    /// Latest location observation
    location: Option<ExtractedFact>,
    scenes: Vec<String>,
}

impl CorpusFacts {
    fn absorb(&mut self, scene: &str, facts: Vec<ExtractedFact>) {
        if !self.scenes.iter().any(|s| s == scene) {
            self.scenes.push(scene.to_string());
        }
        for fact in facts {
            if fact.is_location() {
                self.location = Some(fact);
            } else if !fact.value.trim().is_empty()
                && !self.attributes.iter().any(|f| f.attribute == fact.attribute)
            {
                self.attributes.push(fact);
            }
        }
    }

    fn into_facts(self) -> (Vec<ExtractedFact>, Vec<String>) {
        let mut facts = self.attributes;
        facts.extend(self.location);
        (facts, self.scenes)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Extraction, reconciliation and conflict handling over pluggable storage.
pub struct ContinuityEngine {
    config: EngineConfig,
    records: Arc<dyn RecordStore>,
    conflicts: Arc<dyn ConflictRepository>,
    classifier: Option<Arc<dyn AttributeClassifier>>,
    queue: EntityQueue,
    conflict_lock: Mutex<()>,
    /// Compiled pattern sets keyed by registry fingerprint
    extractors: Cache<String, Arc<Tier1Extractor>>,
}

impl ContinuityEngine {
    /// Create an engine. Fails if the configuration is unusable, including
    /// Tier 2 being enabled without credentials.
    pub fn new(
        config: EngineConfig,
        records: Arc<dyn RecordStore>,
        conflicts: Arc<dyn ConflictRepository>,
    ) -> Result<Self, BibleError> {
        config.validate()?;

        let classifier: Option<Arc<dyn AttributeClassifier>> = if config.tier2.enabled {
            Some(Arc::new(AnthropicClassifier::from_config(&config.tier2)?))
        } else {
            None
        };

        let extractors = Cache::builder()
            .max_capacity(16)
            .time_to_idle(Duration::from_secs(3600))
            .build();

        Ok(Self {
            config,
            records,
            conflicts,
            classifier,
            queue: EntityQueue::new(),
            conflict_lock: Mutex::new(()),
            extractors,
        })
    }

    /// Replace the Tier-2 classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn AttributeClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn extractor(&self, registry: &Registry) -> Arc<Tier1Extractor> {
        let radius = self.config.window_radius;
        let key = Tier1Extractor::fingerprint(registry, radius);
        self.extractors
            .get_with(key, async { Arc::new(Tier1Extractor::new(registry, radius)) })
            .await
    }

    /// Tier 1 plus the optional Tier-2 merge for one document.
    async fn extract(
        &self,
        document: &SceneDocument,
        registry: &Registry,
    ) -> Result<(Vec<EntityFacts>, usize, usize), BibleError> {
        let extractor = self.extractor(registry).await;
        let (body, line_offset) = document.body();
        let output = extractor.extract(&document.path, body, line_offset);
        let mut entities = output.entities;

        let tier2_facts = if self.config.tier2.enabled {
            let classifier = self.classifier.as_ref().ok_or_else(|| {
                BibleError::Config("tier2 is enabled but no classifier is configured".into())
            })?;
            let opted = opted_in_entities(
                registry,
                &document.path,
                self.config.tier2.include_by_default,
            );
            if opted.is_empty() {
                0
            } else {
                let request = ClassifierRequest::new(body, &opted);
                let response = classifier.classify(&request).await?;
                merge_tier2(&mut entities, &response, registry, &document.path)
            }
        } else {
            0
        };

        Ok((entities, output.windows_scanned, tier2_facts))
    }

    /// Read, reconcile and (if needed) write one entity inside its queue slot.
    async fn reconcile_entity(
        &self,
        entity: &str,
        facts: &[ExtractedFact],
        scenes: &[String],
    ) -> Result<(Vec<Change>, Vec<ConflictRecord>), BibleError> {
        self.queue
            .run(entity, move || async move {
                let record = self.records.read_record(entity).await?;
                let outcome = reconcile(&record, entity, facts, scenes);
                if outcome.needs_write {
                    self.records.write_record(entity, &outcome.record).await?;
                    debug!(
                        "Wrote {} ({} change(s), {} new appearance(s))",
                        entity,
                        outcome.changes.len(),
                        outcome.new_appearances.len()
                    );
                }
                Ok((outcome.changes, outcome.conflicts))
            })
            .await
    }

    /// Reconcile a batch of entities in parallel, collecting failures.
    async fn reconcile_all(
        &self,
        batch: Vec<(String, Vec<ExtractedFact>, Vec<String>)>,
    ) -> (Vec<Change>, Vec<ConflictRecord>, Vec<ScanFailure>) {
        let results: Vec<_> = stream::iter(batch)
            .map(|(entity, facts, scenes)| async move {
                let result = self.reconcile_entity(&entity, &facts, &scenes).await;
                (entity, result)
            })
            .buffer_unordered(self.config.scan_concurrency.max(1))
            .collect()
            .await;

        let mut changes = Vec::new();
        let mut conflicts = Vec::new();
        let mut failures = Vec::new();
        for (entity, result) in results {
            match result {
                Ok((c, k)) => {
                    changes.extend(c);
                    conflicts.extend(k);
                }
                Err(e) => {
                    warn!("Reconciliation failed for {}: {}", entity, e);
                    failures.push(ScanFailure {
                        subject: entity,
                        error: e.to_string(),
                    });
                }
            }
        }
        // buffer_unordered completes in any order
        changes.sort_by(|a, b| a.entity.cmp(&b.entity));
        conflicts.sort_by(|a, b| a.entity.cmp(&b.entity));
        (changes, conflicts, failures)
    }

    /// Merge detected conflicts into the persisted log. No-op for an empty batch.
    async fn record_conflicts(
        &self,
        incoming: &[ConflictRecord],
    ) -> Result<MergeSummary, BibleError> {
        if incoming.is_empty() {
            return Ok(MergeSummary::default());
        }
        let _guard = self.conflict_lock.lock().await;
        let mut log = ConflictLog::new(self.conflicts.load_all().await?);
        let summary = log.merge_incoming(incoming.to_vec());
        if summary.changed() {
            self.conflicts.save_all(log.records()).await?;
        }
        Ok(summary)
    }

    /// Scan one document and fold its facts into the bible.
    #[instrument(skip_all, fields(scene = %document.path))]
    pub async fn scan_one(
        &self,
        document: &SceneDocument,
        registry: &Registry,
    ) -> Result<ScanReport, BibleError> {
        let (entities, windows_scanned, tier2_facts) = self.extract(document, registry).await?;
        let appearances: Vec<String> = entities.iter().map(|e| e.entity.clone()).collect();

        let scenes = vec![document.path.clone()];
        let batch = entities
            .into_iter()
            .map(|e| (e.entity, e.facts, scenes.clone()))
            .collect();
        let (changes, conflicts, failures) = self.reconcile_all(batch).await;
        let merge = self.record_conflicts(&conflicts).await?;

        info!(
            "Scanned {}: {} entit(ies), {} change(s), {} conflict(s)",
            document.path,
            appearances.len(),
            changes.len(),
            conflicts.len()
        );

        Ok(ScanReport {
            scene: document.path.clone(),
            appearances,
            changes,
            conflicts,
            merge,
            windows_scanned,
            tier2_facts,
            failures,
        })
    }

    /// Scan every document of a source. See [`ContinuityEngine::scan_documents`].
    pub async fn scan_all(
        &self,
        source: &dyn DocumentSource,
        registry: &Registry,
    ) -> Result<CorpusReport, BibleError> {
        let scenes = source.list_scenes().await?;
        let mut documents = Vec::with_capacity(scenes.len());
        let mut failures = Vec::new();
        for scene in scenes {
            match source.read_scene(&scene).await {
                Ok(document) => documents.push(document),
                Err(e) => {
                    warn!("Skipping {}: {}", scene, e);
                    failures.push(ScanFailure {
                        subject: scene,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.scan_documents(documents, registry).await?;
        failures.append(&mut report.document_failures);
        report.document_failures = failures;
        Ok(report)
    }

    /// Scan a corpus as one batch.
    ///
    /// Documents are processed oldest-modified first. Facts are accumulated
    /// across the corpus before anything is written: for ordinary attributes
    /// the first observation wins, for location the latest. Each entity is
    /// then reconciled once. A document that fails extraction is reported
    /// and skipped.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn scan_documents(
        &self,
        mut documents: Vec<SceneDocument>,
        registry: &Registry,
    ) -> Result<CorpusReport, BibleError> {
        documents.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

        let mut report = CorpusReport::default();
        let mut gathered: BTreeMap<String, CorpusFacts> = BTreeMap::new();

        for document in &documents {
            match self.extract(document, registry).await {
                Ok((entities, _, _)) => {
                    report.documents_scanned += 1;
                    for entity in entities {
                        gathered
                            .entry(entity.entity)
                            .or_default()
                            .absorb(&document.path, entity.facts);
                    }
                }
                Err(e) => {
                    warn!("Extraction failed for {}: {}", document.path, e);
                    report.document_failures.push(ScanFailure {
                        subject: document.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let batch = gathered
            .into_iter()
            .map(|(entity, collected)| {
                let (facts, scenes) = collected.into_facts();
                report.appearances.insert(entity.clone(), scenes.clone());
                (entity, facts, scenes)
            })
            .collect();
        let (changes, conflicts, failures) = self.reconcile_all(batch).await;
        report.merge = self.record_conflicts(&conflicts).await?;
        report.changes = changes;
        report.conflicts = conflicts;
        report.entity_failures = failures;

        info!(
            "Corpus scan: {} document(s), {} change(s), {} conflict(s), {} failure(s)",
            report.documents_scanned,
            report.changes.len(),
            report.conflicts.len(),
            report.document_failures.len() + report.entity_failures.len()
        );
        Ok(report)
    }

    // ========================================================================
    // Conflict resolution
    // ========================================================================

    /// Transition active conflicts for `key` to dismissed under the log lock.
    async fn dismiss_in_log(
        &self,
        key: &ConflictKey,
        note: Option<String>,
        date: &str,
    ) -> Result<Vec<ConflictRecord>, BibleError> {
        let _guard = self.conflict_lock.lock().await;
        let mut log = ConflictLog::new(self.conflicts.load_all().await?);
        let dismissed = log.dismiss(key, note, date);
        if dismissed.is_empty() {
            return Err(BibleError::NotFound {
                entity_type: "conflict".to_string(),
                id: key.to_string(),
            });
        }
        self.conflicts.save_all(log.records()).await?;
        Ok(dismissed)
    }

    /// Record dismissal markers on the entity and, when accepting, force the
    /// conflicting value in.
    async fn apply_resolution(
        &self,
        dismissed: &[ConflictRecord],
        note: Option<String>,
        date: &str,
        accept: bool,
    ) -> Result<EntityRecord, BibleError> {
        let Some(latest) = dismissed.last() else {
            return Err(BibleError::Validation("Nothing to resolve".to_string()));
        };
        let entity = latest.entity.as_str();

        self.queue
            .run(entity, move || async move {
                let mut record = self.records.read_record(entity).await?;
                for conflict in dismissed {
                    record.add_dismissal(DismissedConflict {
                        attribute: conflict.attribute.clone(),
                        value: conflict.new_value.clone(),
                        scene: conflict.new_scene.clone(),
                        note: note.clone(),
                        date: date.to_string(),
                    });
                }
                if accept {
                    record.manual_overrides.remove(&latest.attribute);
                    if latest.attribute == LOCATION_ATTRIBUTE {
                        let value = latest.new_value.trim();
                        record.location = (!value.is_empty()).then(|| value.to_string());
                    } else {
                        record.attributes.insert(
                            latest.attribute.clone(),
                            StoredAttribute {
                                value: latest.new_value.clone(),
                                source_scene: latest.new_scene.clone(),
                                quote: String::new(),
                            },
                        );
                    }
                }
                self.records.write_record(entity, &record).await?;
                Ok(record)
            })
            .await
    }

    /// Dismiss a conflict: the writer keeps the established value and the
    /// contradicting (attribute, value, scene) is pre-approved from now on.
    pub async fn dismiss_conflict(
        &self,
        key: &ConflictKey,
        note: Option<String>,
    ) -> Result<Vec<ConflictRecord>, BibleError> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let dismissed = self.dismiss_in_log(key, note.clone(), &date).await?;
        self.apply_resolution(&dismissed, note, &date, false).await?;
        info!("Dismissed {}", key);
        Ok(dismissed)
    }

    /// Accept a conflict's new value: dismiss it, overwrite the stored value
    /// and drop any manual override on the attribute.
    pub async fn accept_new_value(
        &self,
        key: &ConflictKey,
    ) -> Result<EntityRecord, BibleError> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let note = Some("accepted new value".to_string());
        let dismissed = self.dismiss_in_log(key, note.clone(), &date).await?;
        let record = self.apply_resolution(&dismissed, note, &date, true).await?;
        info!("Accepted new value for {}", key);
        Ok(record)
    }

    /// Set a manual override. Extraction never changes the attribute again
    /// until the override is cleared or a conflicting value is accepted.
    pub async fn set_manual_override(
        &self,
        entity: &str,
        attribute: &str,
        value: &str,
    ) -> Result<EntityRecord, BibleError> {
        let attribute = attribute.trim().to_lowercase();
        let value = value.trim().to_string();
        if attribute.is_empty() || value.is_empty() {
            return Err(BibleError::Validation(
                "Override needs a non-empty attribute and value".to_string(),
            ));
        }

        self.queue
            .run(entity, move || async move {
                let mut record = self.records.read_record(entity).await?;
                record.manual_overrides.insert(attribute.clone(), value.clone());
                refresh_override_rows(&mut record);
                self.records.write_record(entity, &record).await?;
                Ok(record)
            })
            .await
    }

    /// Remove a manual override. Returns false if there was none.
    pub async fn clear_manual_override(
        &self,
        entity: &str,
        attribute: &str,
    ) -> Result<bool, BibleError> {
        let attribute = attribute.trim().to_lowercase();
        self.queue
            .run(entity, move || async move {
                let mut record = self.records.read_record(entity).await?;
                if record.manual_overrides.remove(&attribute).is_none() {
                    return Ok(false);
                }
                self.records.write_record(entity, &record).await?;
                Ok(true)
            })
            .await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Active conflicts, optionally for one entity.
    pub async fn active_conflicts(
        &self,
        entity: Option<&str>,
    ) -> Result<Vec<ConflictRecord>, BibleError> {
        let log = ConflictLog::new(self.conflicts.load_all().await?);
        Ok(log.active(entity).into_iter().cloned().collect())
    }

    /// Every conflict (active and dismissed), optionally for one entity.
    pub async fn all_conflicts(
        &self,
        entity: Option<&str>,
    ) -> Result<Vec<ConflictRecord>, BibleError> {
        let log = ConflictLog::new(self.conflicts.load_all().await?);
        Ok(log.all(entity).into_iter().cloned().collect())
    }

    pub async fn record(&self, entity: &str) -> Result<EntityRecord, BibleError> {
        self.records.read_record(entity).await
    }

    pub async fn records(&self) -> Result<Vec<(String, EntityRecord)>, BibleError> {
        self.records.list_records().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::tier2::ClassifierResponse;
    use crate::models::registry::{EntityKind, LlmOptIn, RegistryEntry};
    use crate::repository::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Registry {
        Registry::new(vec![
            RegistryEntry::new("Elena", EntityKind::Character).with_llm(LlmOptIn::Yes),
            RegistryEntry::new("The Vault", EntityKind::Location).with_aliases(["the Vault"]),
        ])
        .unwrap()
    }

    fn engine(store: &Arc<MemoryStore>) -> ContinuityEngine {
        let config = EngineConfig {
            window_radius: 1,
            ..EngineConfig::default()
        };
        ContinuityEngine::new(config, store.clone(), store.clone()).unwrap()
    }

    /// Classifier with a canned answer that counts calls.
    struct CannedClassifier {
        answer: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AttributeClassifier for CannedClassifier {
        async fn classify(
            &self,
            _request: &ClassifierRequest,
        ) -> Result<ClassifierResponse, BibleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClassifierResponse::parse(&self.answer))
        }
    }

    /// Classifier whose transport always fails.
    struct DownClassifier;

    #[async_trait]
    impl AttributeClassifier for DownClassifier {
        async fn classify(
            &self,
            _request: &ClassifierRequest,
        ) -> Result<ClassifierResponse, BibleError> {
            Err(BibleError::Classifier("connection refused".into()))
        }
    }

    fn tier2_engine(store: &Arc<MemoryStore>, classifier: Arc<dyn AttributeClassifier>) -> ContinuityEngine {
        let mut config = EngineConfig::default();
        config.tier2.enabled = true;
        config.tier2.api_key = Some("test-key".into());
        ContinuityEngine::new(config, store.clone(), store.clone())
            .unwrap()
            .with_classifier(classifier)
    }

    #[tokio::test]
    async fn test_tier2_enabled_without_key_fails_fast() {
        let store = Arc::new(MemoryStore::new());
        let mut config = EngineConfig::default();
        config.tier2.enabled = true;
        let result = ContinuityEngine::new(config, store.clone(), store.clone());
        assert!(matches!(result, Err(BibleError::Config(_))));
    }

    #[tokio::test]
    async fn test_tier2_facts_are_merged() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(CannedClassifier {
            answer: r#"{"Elena": {"accent": {"value": "Northern", "quote": "Elena spoke with a Northern lilt."}}}"#.into(),
            calls: AtomicUsize::new(0),
        });
        let engine = tier2_engine(&store, classifier.clone());

        let doc = SceneDocument::new("ch01.md", "Elena spoke with a Northern lilt.");
        let report = engine.scan_one(&doc, &registry()).await.unwrap();
        assert_eq!(report.tier2_facts, 1);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        let record = engine.record("Elena").await.unwrap();
        assert_eq!(record.attributes["accent"].value, "Northern");
    }

    #[tokio::test]
    async fn test_malformed_classifier_answer_does_not_fail_scan() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(CannedClassifier {
            answer: "I could not find anything {".into(),
            calls: AtomicUsize::new(0),
        });
        let engine = tier2_engine(&store, classifier);

        let doc = SceneDocument::new("ch01.md", "Elena's copper hair caught the light.");
        let report = engine.scan_one(&doc, &registry()).await.unwrap();
        assert_eq!(report.tier2_facts, 0);
        assert_eq!(report.changes.len(), 1);
    }

    #[tokio::test]
    async fn test_classifier_outage_fails_only_that_document() {
        let store = Arc::new(MemoryStore::new());
        let engine = tier2_engine(&store, Arc::new(DownClassifier));
        let doc = SceneDocument::new("ch01.md", "Elena's copper hair caught the light.");

        let err = engine.scan_one(&doc, &registry()).await.unwrap_err();
        assert!(matches!(err, BibleError::Classifier(_)));
        assert_eq!(store.record_writes(), 0);

        let report = engine.scan_documents(vec![doc], &registry()).await.unwrap();
        assert_eq!(report.document_failures.len(), 1);
        assert_eq!(report.documents_scanned, 0);
    }

    #[tokio::test]
    async fn test_extractor_cache_reused_for_same_registry() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let registry = registry();
        let a = engine.extractor(&registry).await;
        let b = engine.extractor(&registry).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_dismiss_unknown_conflict_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let err = engine
            .dismiss_conflict(&ConflictKey::new("Elena", "eyes", "ch09.md"), None)
            .await
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"Not found: conflict with id 'elena.eyes @ ch09.md'");
    }

    #[tokio::test]
    async fn test_accepting_location_conflict_moves_current_location() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        engine
            .set_manual_override("Elena", "location", "The Harbor")
            .await
            .unwrap();

        let doc = SceneDocument::new("ch02.md", "Elena entered the Vault.");
        let report = engine.scan_one(&doc, &registry()).await.unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(engine.record("Elena").await.unwrap().location, None);

        let record = engine
            .accept_new_value(&ConflictKey::new("Elena", "location", "ch02.md"))
            .await
            .unwrap();
        assert_eq!(record.location.as_deref(), Some("The Vault"));
        assert!(!record.attributes.contains_key("location"));
        assert!(record.manual_overrides.is_empty());
    }

    #[tokio::test]
    async fn test_override_validation() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        assert!(matches!(
            engine.set_manual_override("Elena", " ", "silver").await,
            Err(BibleError::Validation(_))
        ));
        assert!(!engine.clear_manual_override("Elena", "hair").await.unwrap());
        assert_eq!(store.record_writes(), 0);
    }
}
