//! Conflict records: contradictions between established and new facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

use crate::models::registry::entity_key;

/// Severity of a contradiction.
///
/// The engine only emits `Hard`; `Soft` exists so records classified by a
/// presentation layer round-trip through the conflict log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    #[default]
    Active,
    Dismissed,
}

/// Dedup key: (entity, attribute, new scene).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    /// Lower-cased canonical entity name
    pub entity: String,
    pub attribute: String,
    pub scene: String,
}

impl ConflictKey {
    pub fn new(entity: &str, attribute: &str, scene: &str) -> Self {
        Self {
            entity: entity_key(entity),
            attribute: attribute.to_lowercase(),
            scene: scene.to_string(),
        }
    }
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} @ {}", self.entity, self.attribute, self.scene)
    }
}

/// A recorded contradiction.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: String,
    pub kind: ConflictKind,
    /// Canonical entity name
    pub entity: String,
    pub attribute: String,
    pub prior_value: String,
    pub prior_scene: String,
    pub new_value: String,
    pub new_scene: String,
    pub new_line: Option<usize>,
    #[serde(default)]
    pub status: ConflictStatus,
    pub note: Option<String>,
    pub dismissed_at: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl ConflictRecord {
    /// A new active hard conflict.
    pub fn hard(
        entity: &str,
        attribute: &str,
        prior_value: &str,
        prior_scene: &str,
        new_value: &str,
        new_scene: &str,
        new_line: Option<usize>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ConflictKind::Hard,
            entity: entity.to_string(),
            attribute: attribute.to_string(),
            prior_value: prior_value.to_string(),
            prior_scene: prior_scene.to_string(),
            new_value: new_value.to_string(),
            new_scene: new_scene.to_string(),
            new_line,
            status: ConflictStatus::Active,
            note: None,
            dismissed_at: None,
            detected_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ConflictKey {
        ConflictKey::new(&self.entity, &self.attribute, &self.new_scene)
    }

    pub fn is_active(&self) -> bool {
        self.status == ConflictStatus::Active
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {}: '{}' ({}) vs '{}' ({})",
            self.entity,
            self.attribute,
            self.prior_value,
            self.prior_scene,
            self.new_value,
            self.new_scene
        )
    }
}
