//! Tier-2 merge: folding external classifier output into the Tier-1 facts.
//!
//! The classifier itself lives in `services::classifier`; this module only
//! validates its response shape and applies the merge rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extraction::patterns::is_tier1_category;
use crate::models::fact::{EntityFacts, ExtractedFact, Provenance};
use crate::models::registry::{EntityKind, Registry, RegistryEntry};

/// One attribute observation returned by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedAttribute {
    pub value: String,
    #[serde(default)]
    pub quote: String,
}

/// Entity token → attribute → observation, as returned by the classifier.
pub type ClassifiedEntities = BTreeMap<String, BTreeMap<String, ClassifiedAttribute>>;

/// Classifier output after shape validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassifierResponse {
    Parsed(ClassifiedEntities),
    /// Nothing usable: empty, unparseable or wrongly shaped
    #[default]
    Empty,
}

impl ClassifierResponse {
    /// Parse raw classifier text.
    ///
    /// The JSON object may be wrapped in prose or a code fence. Entries that
    /// are not objects, or attributes without a non-empty string `value`, are
    /// dropped. Anything unparseable yields `Empty` and a warning.
    pub fn parse(raw: &str) -> Self {
        let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
            if !raw.trim().is_empty() {
                warn!("Classifier response contained no JSON object");
            }
            return ClassifierResponse::Empty;
        };
        if end < start {
            warn!("Classifier response contained no JSON object");
            return ClassifierResponse::Empty;
        }

        let value: Value = match serde_json::from_str(&raw[start..=end]) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unparseable classifier response: {}", e);
                return ClassifierResponse::Empty;
            }
        };
        Self::from_value(&value)
    }

    /// Validate an already-decoded JSON value.
    pub fn from_value(value: &Value) -> Self {
        let Some(entities) = value.as_object() else {
            warn!("Classifier response is not a JSON object");
            return ClassifierResponse::Empty;
        };

        let mut parsed = ClassifiedEntities::new();
        for (entity, attributes) in entities {
            let Some(attributes) = attributes.as_object() else {
                debug!("Ignoring non-object classifier entry for '{}'", entity);
                continue;
            };
            let mut kept = BTreeMap::new();
            for (attribute, observation) in attributes {
                let value = observation
                    .get("value")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                let Some(value) = value else { continue };
                let quote = observation
                    .get("quote")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                kept.insert(
                    attribute.clone(),
                    ClassifiedAttribute {
                        value: value.to_string(),
                        quote: quote.to_string(),
                    },
                );
            }
            if !kept.is_empty() {
                parsed.insert(entity.clone(), kept);
            }
        }

        if parsed.is_empty() {
            ClassifierResponse::Empty
        } else {
            ClassifierResponse::Parsed(parsed)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ClassifierResponse::Empty)
    }
}

/// Characters in `scene` whose opt-in resolves to "send to the classifier".
pub fn opted_in_entities<'a>(
    registry: &'a Registry,
    scene: &'a str,
    include_by_default: bool,
) -> Vec<&'a RegistryEntry> {
    registry
        .characters_for_scene(scene)
        .filter(|e| e.llm.resolve(include_by_default))
        .collect()
}

/// Merge classifier output into the Tier-1 result. Returns the number of
/// facts added.
///
/// An attribute is skipped when Tier 1 owns its category and already produced
/// a value for that entity, or when a classifier fact for it was already
/// merged. Entities Tier 1 did not see get a new entry.
pub fn merge_tier2(
    entities: &mut Vec<EntityFacts>,
    response: &ClassifierResponse,
    registry: &Registry,
    scene: &str,
) -> usize {
    let ClassifierResponse::Parsed(parsed) = response else {
        return 0;
    };

    let mut added = 0;
    for (token, attributes) in parsed {
        let Some(entry) = registry.find(token) else {
            debug!("Classifier named unknown entity '{}'", token);
            continue;
        };
        if entry.kind != EntityKind::Character || !entry.applies_to_scene(scene) {
            continue;
        }

        let index = match entities.iter().position(|e| e.entity == entry.name) {
            Some(index) => index,
            None => {
                entities.push(EntityFacts::new(entry.name.clone()));
                entities.len() - 1
            }
        };
        let target = &mut entities[index];

        for (attribute, observation) in attributes {
            let attribute = attribute.trim().to_lowercase();
            if attribute.is_empty() {
                continue;
            }
            let owned_by_tier1 = is_tier1_category(&attribute)
                && target
                    .facts
                    .iter()
                    .any(|f| f.attribute == attribute && f.provenance == Provenance::Tier1);
            let already_merged = target
                .facts
                .iter()
                .any(|f| f.attribute == attribute && f.provenance == Provenance::Tier2);
            if owned_by_tier1 || already_merged {
                continue;
            }

            target.facts.push(ExtractedFact::new(
                attribute,
                observation.value.trim(),
                scene,
                None,
                &observation.quote,
                Provenance::Tier2,
            ));
            added += 1;
        }
    }

    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::LlmOptIn;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Registry::new(vec![
            RegistryEntry::new("Elena", EntityKind::Character).with_aliases(["Lena"]),
            RegistryEntry::new("Marcus", EntityKind::Character).with_llm(LlmOptIn::No),
            RegistryEntry::new("The Vault", EntityKind::Location),
        ])
        .expect("valid registry")
    }

    #[test]
    fn test_parse_tolerates_prose_and_bad_fields() {
        let raw = r#"Here you go:
```json
{"Lena": {"hair": {"value": "auburn", "quote": "her auburn hair"},
          "mood": "grim",
          "accent": {"value": ""},
          "height": {"value": 180}},
 "Marcus": []}
```"#;
        let ClassifierResponse::Parsed(parsed) = ClassifierResponse::parse(raw) else {
            panic!("expected parsed response");
        };
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["Lena"].len(), 1);
        assert_eq!(parsed["Lena"]["hair"].value, "auburn");
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(ClassifierResponse::parse("not json at all").is_empty());
        assert!(ClassifierResponse::parse("{\"broken\": ").is_empty());
        assert!(ClassifierResponse::parse("[1, 2]").is_empty());
        assert!(ClassifierResponse::parse("").is_empty());
    }

    #[test]
    fn test_merge_skips_tier1_owned_attribute() {
        let mut entities = vec![EntityFacts {
            entity: "Elena".into(),
            facts: vec![ExtractedFact::new(
                "hair",
                "copper",
                "ch01.md",
                Some(1),
                "q",
                Provenance::Tier1,
            )],
        }];
        let response = ClassifierResponse::parse(
            r#"{"Lena": {"hair": {"value": "auburn"}, "accent": {"value": "Northern", "quote": "a Northern lilt"}}}"#,
        );

        let added = merge_tier2(&mut entities, &response, &registry(), "ch01.md");
        assert_eq!(added, 1);
        let accent = entities[0]
            .facts
            .iter()
            .find(|f| f.attribute == "accent")
            .expect("accent merged");
        assert_eq!(accent.value, "Northern");
        assert_eq!(accent.line, None);
        assert_eq!(accent.provenance, Provenance::Tier2);
        assert!(!entities[0].facts.iter().any(|f| f.value == "auburn"));
    }

    #[test]
    fn test_merge_keeps_owned_category_when_tier1_silent() {
        let mut entities = Vec::new();
        let response = ClassifierResponse::parse(r#"{"Elena": {"Eyes": {"value": "grey"}}}"#);
        assert_eq!(merge_tier2(&mut entities, &response, &registry(), "ch01.md"), 1);
        assert_eq!(entities[0].entity, "Elena");
        assert_eq!(entities[0].facts[0].attribute, "eyes");
    }

    #[test]
    fn test_merge_first_wins_across_calls() {
        let mut entities = Vec::new();
        let first = ClassifierResponse::parse(r#"{"Elena": {"accent": {"value": "Northern"}}}"#);
        let second = ClassifierResponse::parse(r#"{"Lena": {"accent": {"value": "Southern"}}}"#);
        merge_tier2(&mut entities, &first, &registry(), "ch01.md");
        assert_eq!(merge_tier2(&mut entities, &second, &registry(), "ch01.md"), 0);
        assert_eq!(entities[0].facts.len(), 1);
        assert_eq!(entities[0].facts[0].value, "Northern");
    }

    #[test]
    fn test_merge_ignores_unknown_and_non_characters() {
        let mut entities = Vec::new();
        let response = ClassifierResponse::parse(
            r#"{"Nobody": {"hair": {"value": "red"}}, "The Vault": {"door": {"value": "iron"}}}"#,
        );
        assert_eq!(merge_tier2(&mut entities, &response, &registry(), "ch01.md"), 0);
        assert!(entities.is_empty());
    }

    #[test]
    fn test_opted_in_entities() {
        let registry = registry();
        let names: Vec<&str> = opted_in_entities(&registry, "ch01.md", true)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Elena"]);
        assert!(opted_in_entities(&registry, "ch01.md", false).is_empty());
    }
}
