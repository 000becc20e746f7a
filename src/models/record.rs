//! Persisted per-entity record.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::{BTreeMap, BTreeSet};

use crate::utils::text::values_match;

/// Prior-scene sentinel for conflicts raised against a manual override.
pub const MANUAL_OVERRIDE_SCENE: &str = "(manual override)";

/// An extracted attribute as stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttribute {
    pub value: String,
    /// Scene that first established the value
    pub source_scene: String,
    #[serde(default)]
    pub quote: String,
}

/// Marker that pre-approves an (attribute, value, scene) contradiction.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismissedConflict {
    pub attribute: String,
    pub value: String,
    pub scene: String,
    pub note: Option<String>,
    /// ISO date (YYYY-MM-DD)
    pub date: String,
}

impl DismissedConflict {
    pub fn matches(&self, attribute: &str, value: &str, scene: &str) -> bool {
        self.attribute == attribute && self.scene == scene && values_match(&self.value, value)
    }
}

/// Everything the engine knows about one entity.
///
/// Invariant: an attribute present in `manual_overrides` is never altered by
/// extraction; only accepting a conflicting value removes the override.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(default)]
    pub attributes: BTreeMap<String, StoredAttribute>,
    #[serde(default)]
    pub appearances: BTreeSet<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub manual_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub dismissed_conflicts: Vec<DismissedConflict>,
}

impl EntityRecord {
    /// Value a reader should trust: the override if present, else the extracted value.
    pub fn effective_value(&self, attribute: &str) -> Option<&str> {
        self.manual_overrides
            .get(attribute)
            .map(String::as_str)
            .or_else(|| self.attributes.get(attribute).map(|a| a.value.as_str()))
    }

    pub fn is_dismissed(&self, attribute: &str, value: &str, scene: &str) -> bool {
        self.dismissed_conflicts
            .iter()
            .any(|d| d.matches(attribute, value, scene))
    }

    /// Add a dismissal marker unless an identical one exists. Returns true if added.
    pub fn add_dismissal(&mut self, marker: DismissedConflict) -> bool {
        if self.is_dismissed(&marker.attribute, &marker.value, &marker.scene) {
            return false;
        }
        self.dismissed_conflicts.push(marker);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.appearances.is_empty()
            && self.location.is_none()
            && self.manual_overrides.is_empty()
            && self.dismissed_conflicts.is_empty()
    }
}
