//! Extracted facts: single attribute/value observations with provenance.
//!
//! Facts are immutable once created. A scan produces a transient batch of
//! them; only the reconciler's merge output is ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Attribute key used for location facts.
pub const LOCATION_ATTRIBUTE: &str = "location";

/// Attribute key used by the appositive-clause pattern.
pub const COMPLEXION_ATTRIBUTE: &str = "complexion";

/// Quotes are truncated to this many words.
pub const QUOTE_WORD_LIMIT: usize = 30;

/// Where a fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Lexical pattern matching
    Tier1,
    /// External classifier
    Tier2,
    /// User-authored
    Manual,
}

/// One observation about an entity.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Lower-case category, or `location`
    pub attribute: String,
    /// Empty string means "cleared", distinct from absent
    pub value: String,
    pub scene: String,
    /// 1-based line in the original document; unset for classifier output
    pub line: Option<usize>,
    pub quote: String,
    pub provenance: Provenance,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractedFact {
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        scene: impl Into<String>,
        line: Option<usize>,
        quote: &str,
        provenance: Provenance,
    ) -> Self {
        Self {
            attribute: attribute.into().to_lowercase(),
            value: value.into(),
            scene: scene.into(),
            line,
            quote: crate::utils::text::truncate_words(quote, QUOTE_WORD_LIMIT),
            provenance,
            extracted_at: Utc::now(),
        }
    }

    pub fn is_location(&self) -> bool {
        self.attribute == LOCATION_ATTRIBUTE
    }

    /// Location facts with an empty value mean "no longer there".
    pub fn is_clearing(&self) -> bool {
        self.is_location() && self.value.trim().is_empty()
    }
}

/// All facts observed for one entity in one scan.
///
/// An entity mentioned without any extractable fact still gets an entry so
/// its appearance is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFacts {
    /// Canonical registry name
    pub entity: String,
    pub facts: Vec<ExtractedFact>,
}

impl EntityFacts {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            facts: Vec::new(),
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.facts.iter().any(|f| f.attribute == attribute)
    }
}
