//! Engine configuration.
//!
//! Loaded from `{data_path}/storybible.toml`, then environment overrides,
//! then defaults. A missing or unparseable file falls back to defaults.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::BibleError;

pub const CONFIG_FILE: &str = "storybible.toml";

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";

fn default_window_radius() -> usize {
    2
}

fn default_scan_concurrency() -> usize {
    4
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    2048
}

/// External classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier2Config {
    #[serde(default)]
    pub enabled: bool,
    /// Opt-in for registry entries whose `llm` is `inherit`
    #[serde(default)]
    pub include_by_default: bool,
    /// Falls back to `ANTHROPIC_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for Tier2Config {
    fn default() -> Self {
        Self {
            enabled: false,
            include_by_default: false,
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Tier2Config {
    /// API key with surrounding whitespace removed; `None` if blank.
    pub fn credentials(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Settings for extraction and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Paragraphs on each side of a mention included in its window
    #[serde(default = "default_window_radius")]
    pub window_radius: usize,
    /// Entities reconciled in parallel during a full scan
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default)]
    pub tier2: Tier2Config,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_radius: default_window_radius(),
            scan_concurrency: default_scan_concurrency(),
            tier2: Tier2Config::default(),
        }
    }
}

impl EngineConfig {
    /// Load with priority: file > env overrides > defaults.
    pub fn load(data_path: &Path) -> Self {
        let mut config: EngineConfig =
            read_toml_file(&data_path.join(CONFIG_FILE)).unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `STORYBIBLE_*` / `ANTHROPIC_API_KEY` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(radius) = lookup("STORYBIBLE_WINDOW_RADIUS") {
            match radius.trim().parse() {
                Ok(r) => self.window_radius = r,
                Err(_) => tracing::warn!("Ignoring STORYBIBLE_WINDOW_RADIUS={}", radius),
            }
        }
        if let Some(enabled) = lookup("STORYBIBLE_TIER2_ENABLED") {
            self.tier2.enabled = matches!(
                enabled.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if self.tier2.credentials().is_none() {
            if let Some(key) = lookup("ANTHROPIC_API_KEY") {
                self.tier2.api_key = Some(key);
            }
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), BibleError> {
        if self.scan_concurrency == 0 {
            return Err(BibleError::Config(
                "scan_concurrency must be at least 1".to_string(),
            ));
        }
        if self.tier2.enabled && self.tier2.credentials().is_none() {
            return Err(BibleError::Config(
                "tier2 is enabled but no API key is configured (set tier2.api_key or ANTHROPIC_API_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and parse a TOML file, logging and returning `None` on any failure.
pub fn read_toml_file<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<T>(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}. Using default.", path.display(), e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}. Using default.", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window_radius, 2);
        assert_eq!(config.scan_concurrency, 4);
        assert!(!config.tier2.enabled);
        assert!(!config.tier2.include_by_default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "window_radius = 1\n[tier2]\ninclude_by_default = true\n",
        )
        .expect("write config");
        let config: EngineConfig =
            read_toml_file(&dir.path().join(CONFIG_FILE)).expect("parsed");
        assert_eq!(config.window_radius, 1);
        assert_eq!(config.scan_concurrency, 4);
        assert!(config.tier2.include_by_default);
        assert_eq!(config.tier2.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_unparseable_file_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "window_radius = [").expect("write config");
        assert!(read_toml_file::<EngineConfig>(&path).is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config.apply_env(env(&[
            ("STORYBIBLE_WINDOW_RADIUS", "5"),
            ("STORYBIBLE_TIER2_ENABLED", "true"),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ]));
        assert_eq!(config.window_radius, 5);
        assert!(config.tier2.enabled);
        assert_eq!(config.tier2.credentials(), Some("sk-test"));
    }

    #[test]
    fn test_bad_radius_override_ignored() {
        let mut config = EngineConfig::default();
        config.apply_env(env(&[("STORYBIBLE_WINDOW_RADIUS", "wide")]));
        assert_eq!(config.window_radius, 2);
    }

    #[test]
    fn test_tier2_without_key_fails_validation() {
        let mut config = EngineConfig::default();
        config.tier2.enabled = true;
        config.tier2.api_key = Some("   ".to_string());
        let err = config.validate().expect_err("missing key");
        insta::assert_snapshot!(err.to_string(), @"Configuration error: tier2 is enabled but no API key is configured (set tier2.api_key or ANTHROPIC_API_KEY)");
    }
}
