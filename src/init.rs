//! Shared initialization for CLI commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::db::connection::{connect, StoreConfig};
use crate::db::schema::apply_schema;
use crate::models::registry::Registry;
use crate::repository::SurrealStore;
use crate::services::ContinuityEngine;

/// Registry file looked up in the data directory when `--registry` is absent.
pub const REGISTRY_FILE: &str = "registry.yaml";

/// Application context: engine and registry for one invocation.
pub struct AppContext {
    pub data_path: PathBuf,
    pub engine: ContinuityEngine,
    pub registry: Registry,
}

/// Resolve the data directory.
///
/// Priority: explicit path > STORYBIBLE_DATA_PATH env > ./.storybible (if exists) > ~/.storybible
pub fn resolve_data_path(explicit_path: Option<PathBuf>) -> PathBuf {
    explicit_path
        .or_else(|| std::env::var("STORYBIBLE_DATA_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            let local_path = Path::new(".storybible");
            if local_path.is_dir() {
                Some(local_path.to_path_buf())
            } else {
                None
            }
        })
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".storybible"))
                .unwrap_or_else(|| PathBuf::from(".storybible"))
        })
}

impl AppContext {
    /// Connect to the bible and load configuration and registry.
    ///
    /// A missing registry file yields an empty registry; a malformed one is an error.
    pub async fn new(explicit_path: Option<PathBuf>, registry_path: Option<PathBuf>) -> Result<Self> {
        let data_path = resolve_data_path(explicit_path);
        tracing::info!("Using data path: {}", data_path.display());

        let store_config = StoreConfig::load(&data_path);
        let db = connect(&store_config, &data_path).await?;
        tracing::info!("Database connected");

        apply_schema(&db).await?;
        tracing::info!("Schema applied");

        let store = Arc::new(SurrealStore::new(Arc::new(db)));

        let config = EngineConfig::load(&data_path);
        let engine = ContinuityEngine::new(config, store.clone(), store)?;

        let registry_path = registry_path.unwrap_or_else(|| data_path.join(REGISTRY_FILE));
        let registry = if registry_path.exists() {
            Registry::load(&registry_path)
                .await
                .with_context(|| format!("Loading registry {}", registry_path.display()))?
        } else {
            tracing::warn!(
                "No registry at {}; nothing will be tracked",
                registry_path.display()
            );
            Registry::default()
        };
        tracing::info!("Registry loaded ({} entries)", registry.len());

        Ok(Self {
            data_path,
            engine,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_path_wins() {
        let path = resolve_data_path(Some(PathBuf::from("/tmp/bible")));
        assert_eq!(path, PathBuf::from("/tmp/bible"));
    }
}
