//! Bible storage connection.

use std::path::Path;

use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::opt::capabilities::Capabilities;
use surrealdb::Surreal;
use tracing::debug;

use crate::config::{read_toml_file, CONFIG_FILE};
use crate::BibleError;

/// Handle to the bible store, embedded or remote.
pub type BibleDb = Surreal<Any>;

pub const NAMESPACE: &str = "storybible";
pub const DATABASE: &str = "bible";

/// Embedded store directory under the data path
const STORE_DIR: &str = "bible.db";

/// The `[store]` table of `storybible.toml`.
///
/// An unset endpoint means an embedded RocksDB store under the data path.
/// `ws://` / `wss://` endpoints let an editor plugin and the CLI share one
/// bible through a SurrealDB server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    store: StoreConfig,
}

impl StoreConfig {
    /// Embedded store in `dir`.
    pub fn embedded(dir: &Path) -> Self {
        Self {
            endpoint: Some(format!("rocksdb:{}", dir.display())),
            ..Self::default()
        }
    }

    /// `[store]` from the config file, then `STORYBIBLE_DB_*` overrides.
    pub fn load(data_path: &Path) -> Self {
        let mut config = read_toml_file::<ConfigFile>(&data_path.join(CONFIG_FILE))
            .map(|file| file.store)
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STORYBIBLE_DB_URL") {
            self.endpoint = Some(url);
        }
        if let Some(user) = lookup("STORYBIBLE_DB_USER") {
            self.username = Some(user);
        }
        if let Some(pass) = lookup("STORYBIBLE_DB_PASS") {
            self.password = Some(pass);
        }
    }

    /// Endpoint to connect to for a bible rooted at `data_path`.
    pub fn endpoint_for(&self, data_path: &Path) -> String {
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => format!("rocksdb:{}", data_path.join(STORE_DIR).display()),
        }
    }
}

fn is_remote(endpoint: &str) -> bool {
    endpoint.starts_with("ws://") || endpoint.starts_with("wss://")
}

/// Connect to the bible store and select its namespace.
///
/// Remote servers are signed into as root; credentials default to
/// `root`/`root` like a fresh `surreal start`.
pub async fn connect(config: &StoreConfig, data_path: &Path) -> Result<BibleDb, BibleError> {
    let endpoint = config.endpoint_for(data_path);

    let db = if is_remote(&endpoint) {
        let db = surrealdb::engine::any::connect(&endpoint).await?;
        db.signin(Root {
            username: config.username.as_deref().unwrap_or("root"),
            password: config.password.as_deref().unwrap_or("root"),
        })
        .await?;
        db
    } else {
        let options = surrealdb::opt::Config::new().capabilities(Capabilities::all());
        surrealdb::engine::any::connect((endpoint.clone(), options)).await?
    };

    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    debug!("Connected to {}", endpoint);
    Ok(db)
}
