//! Registry of entities the engine is allowed to track.
//!
//! The registry is produced by an external collaborator (the human-edited
//! registry note). The engine only consumes its parsed form: an ordered list
//! of entries, read-only for the duration of a scan.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashSet;
use std::path::Path;

use crate::BibleError;

// ============================================================================
// Entry Types
// ============================================================================

/// Kind of tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Character,
    Location,
    Object,
    Faction,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Location => "location",
            EntityKind::Object => "object",
            EntityKind::Faction => "faction",
        }
    }
}

/// Three-state opt-in for the external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmOptIn {
    /// Follow the global `tier2.include_by_default` setting
    #[default]
    Inherit,
    Yes,
    No,
}

impl LlmOptIn {
    /// Resolve against the configured default.
    pub fn resolve(&self, include_by_default: bool) -> bool {
        match self {
            LlmOptIn::Inherit => include_by_default,
            LlmOptIn::Yes => true,
            LlmOptIn::No => false,
        }
    }
}

/// An entity the engine may track.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Canonical name, unique case-insensitively
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub kind: EntityKind,
    /// Scene-identifier prefix the entity is restricted to
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub excluded: bool,
    #[serde(default)]
    pub llm: LlmOptIn,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            kind,
            scope: None,
            excluded: false,
            llm: LlmOptIn::Inherit,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_llm(mut self, llm: LlmOptIn) -> Self {
        self.llm = llm;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Identity key: the lower-cased canonical name.
    pub fn key(&self) -> String {
        entity_key(&self.name)
    }

    /// Canonical name followed by aliases, empty strings skipped.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|s| !s.trim().is_empty())
    }

    /// Whether this entry is tracked in the given scene.
    pub fn applies_to_scene(&self, scene: &str) -> bool {
        if self.excluded {
            return false;
        }
        match &self.scope {
            Some(prefix) if !prefix.is_empty() => scene.starts_with(prefix.as_str()),
            _ => true,
        }
    }
}

/// Identity key for an entity name.
pub fn entity_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// Registry Snapshot
// ============================================================================

/// Read-only snapshot of the registry for one scan invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Build a registry, rejecting duplicate canonical names.
    pub fn new(entries: Vec<RegistryEntry>) -> Result<Self, BibleError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(BibleError::Registry(
                    "Registry entry with empty name".to_string(),
                ));
            }
            if !seen.insert(entry.key()) {
                return Err(BibleError::Registry(format!(
                    "Duplicate registry entry '{}'",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Parse a YAML registry (either a bare list or `entries:` mapping).
    pub fn from_yaml(yaml: &str) -> Result<Self, BibleError> {
        let entries: Vec<RegistryEntry> = match serde_yaml_ng::from_str::<Registry>(yaml) {
            Ok(registry) => registry.entries,
            Err(_) => serde_yaml_ng::from_str(yaml)?,
        };
        Self::new(entries)
    }

    /// Load a YAML registry file.
    pub async fn load(path: &Path) -> Result<Self, BibleError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            BibleError::Io(format!("Failed to read registry {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Look up an entry by canonical name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        let key = entity_key(name);
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Look up an entry by canonical name or alias.
    pub fn find(&self, token: &str) -> Option<&RegistryEntry> {
        let token = token.trim();
        self.get(token).or_else(|| {
            self.entries
                .iter()
                .find(|e| e.aliases.iter().any(|a| a.eq_ignore_ascii_case(token)))
        })
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Non-excluded characters tracked in `scene`.
    pub fn characters_for_scene<'a>(
        &'a self,
        scene: &'a str,
    ) -> impl Iterator<Item = &'a RegistryEntry> {
        self.of_kind(EntityKind::Character)
            .filter(move |e| e.applies_to_scene(scene))
    }

    /// Non-excluded locations, the candidates for location resolution.
    pub fn locations(&self) -> Vec<&RegistryEntry> {
        self.of_kind(EntityKind::Location)
            .filter(|e| !e.excluded)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_opt_in_resolution() {
        assert!(LlmOptIn::Yes.resolve(false));
        assert!(!LlmOptIn::No.resolve(true));
        assert!(LlmOptIn::Inherit.resolve(true));
        assert!(!LlmOptIn::Inherit.resolve(false));
    }

    #[test]
    fn test_duplicate_names_rejected_case_insensitively() {
        let result = Registry::new(vec![
            RegistryEntry::new("Elena", EntityKind::Character),
            RegistryEntry::new("elena", EntityKind::Character),
        ]);
        assert!(matches!(result, Err(BibleError::Registry(_))));
    }

    #[test]
    fn test_scope_restricts_scenes() {
        let entry = RegistryEntry::new("Elena", EntityKind::Character).with_scope("book-one/");
        assert!(entry.applies_to_scene("book-one/ch01.md"));
        assert!(!entry.applies_to_scene("book-two/ch01.md"));
    }

    #[test]
    fn test_excluded_entry_never_applies() {
        let entry = RegistryEntry::new("Narrator", EntityKind::Character).excluded();
        assert!(!entry.applies_to_scene("ch01.md"));
    }

    #[test]
    fn test_from_yaml_list_and_mapping() {
        let list = r#"
- name: Elena
  aliases: [Lena]
  kind: character
- name: The Vault
  aliases: ["the Vault"]
  kind: location
"#;
        let registry = Registry::from_yaml(list).expect("list form");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("lena").map(|e| e.name.as_str()), Some("Elena"));

        let mapping = r#"
entries:
  - name: Marcus
    llm: "yes"
"#;
        let registry = Registry::from_yaml(mapping).expect("mapping form");
        let marcus = registry.get("MARCUS").expect("marcus");
        assert_eq!(marcus.kind, EntityKind::Character);
        assert_eq!(marcus.llm, LlmOptIn::Yes);
    }

    #[test]
    fn test_surface_forms_skip_blank_aliases() {
        let entry =
            RegistryEntry::new("Elena", EntityKind::Character).with_aliases(["Lena", "  "]);
        let forms: Vec<&str> = entry.surface_forms().collect();
        assert_eq!(forms, vec!["Elena", "Lena"]);
    }
}
