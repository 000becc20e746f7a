//! Test harness for database lifecycle management.
//!
//! Provides isolated database instances per test using tempfile.

use std::sync::Arc;
use tempfile::TempDir;

use storybible::config::EngineConfig;
use storybible::db::connection::{connect, BibleDb, StoreConfig};
use storybible::db::schema::apply_schema;
use storybible::repository::{MemoryStore, SurrealStore};
use storybible::services::ContinuityEngine;

/// Test harness that manages database lifecycle.
///
/// Each TestHarness creates an isolated database in a temporary directory.
/// The database is automatically cleaned up when the harness is dropped.
pub struct TestHarness {
    /// Database connection wrapped in Arc for service sharing
    pub db: Arc<BibleDb>,
    pub store: Arc<SurrealStore>,
    /// Temporary directory (kept alive while harness exists)
    pub temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with isolated database.
    ///
    /// Panics if database initialization fails (appropriate for tests).
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for test database");

        let config = StoreConfig::embedded(&temp_dir.path().join("test.db"));
        let db = connect(&config, temp_dir.path())
            .await
            .expect("Failed to initialize test database");

        apply_schema(&db)
            .await
            .expect("Failed to apply schema to test database");

        let db = Arc::new(db);
        Self {
            store: Arc::new(SurrealStore::new(db.clone())),
            db,
            temp_dir,
        }
    }

    /// Get the path to the temporary directory.
    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Engine over this harness's database.
    pub fn engine(&self, config: EngineConfig) -> ContinuityEngine {
        ContinuityEngine::new(config, self.store.clone(), self.store.clone())
            .expect("valid engine config")
    }
}

/// Engine config with the given window radius and Tier 2 off.
pub fn config_with_radius(window_radius: usize) -> EngineConfig {
    EngineConfig {
        window_radius,
        ..EngineConfig::default()
    }
}

/// Engine over a fresh in-memory store (write counts observable).
pub fn memory_engine(config: EngineConfig) -> (ContinuityEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = ContinuityEngine::new(config, store.clone(), store.clone())
        .expect("valid engine config");
    (engine, store)
}
