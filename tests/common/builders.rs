//! Test data builders for registries and scenes.

use chrono::{DateTime, Duration, TimeZone, Utc};

use storybible::models::{EntityKind, LlmOptIn, Registry, RegistryEntry, SceneDocument};

/// Builder for test registries.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<RegistryEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a character with optional aliases.
    pub fn character(mut self, name: &str, aliases: &[&str]) -> Self {
        self.entries.push(
            RegistryEntry::new(name, EntityKind::Character)
                .with_aliases(aliases.iter().copied())
                .with_llm(LlmOptIn::Inherit),
        );
        self
    }

    /// Add a location with optional aliases.
    pub fn location(mut self, name: &str, aliases: &[&str]) -> Self {
        self.entries.push(
            RegistryEntry::new(name, EntityKind::Location).with_aliases(aliases.iter().copied()),
        );
        self
    }

    /// Add a fully custom entry.
    pub fn entry(mut self, entry: RegistryEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> Registry {
        Registry::new(self.entries).expect("valid test registry")
    }
}

/// Elena, Marcus ("the Captain"), The Vault ("the Vault") and The Harbor.
pub fn standard_registry() -> Registry {
    RegistryBuilder::new()
        .character("Elena", &[])
        .character("Marcus", &["the Captain"])
        .location("The Vault", &["the Vault"])
        .location("The Harbor", &["the Harbor"])
        .build()
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Scene modified `minutes` after a fixed epoch, so corpus order is explicit.
pub fn scene_at(path: &str, content: &str, minutes: i64) -> SceneDocument {
    SceneDocument::new(path, content).with_modified(epoch() + Duration::minutes(minutes))
}

/// Scene with a fixed modification time.
pub fn scene(path: &str, content: &str) -> SceneDocument {
    scene_at(path, content, 0)
}
