//! Fact reconciliation: merging a fact batch into one entity's record.
//!
//! Pure computation. The caller reads the record, calls [`reconcile`] and
//! writes the returned record only when `needs_write` is set, all inside the
//! entity's serialized section.

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::models::conflict::ConflictRecord;
use crate::models::fact::ExtractedFact;
use crate::models::record::{EntityRecord, StoredAttribute, MANUAL_OVERRIDE_SCENE};
use crate::utils::text::values_match;

/// One modification applied to a record.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub entity: String,
    pub attribute: String,
    /// `None` when the attribute was first established (or location was unset)
    pub old: Option<String>,
    /// `None` when a location was cleared
    pub new: Option<String>,
    pub scene: String,
}

/// Result of reconciling one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Full next state of the record
    pub record: EntityRecord,
    pub changes: Vec<Change>,
    pub conflicts: Vec<ConflictRecord>,
    /// Scenes added to the appearance set
    pub new_appearances: Vec<String>,
    /// False when the record is unchanged and must not be written
    pub needs_write: bool,
}

fn location_matches(stored: Option<&str>, new: Option<&str>) -> bool {
    match (stored, new) {
        (None, None) => true,
        (Some(a), Some(b)) => values_match(a, b),
        _ => false,
    }
}

/// Merge `facts` for `entity` into `record`.
///
/// `scenes` are the scenes the entity appeared in; they are unioned into the
/// appearance set whether or not any fact changed. Facts are applied in
/// order, so a later fact sees the effect of an earlier one. Location is a
/// net value: only the last location fact of the batch is compared with the
/// stored location.
pub fn reconcile(
    record: &EntityRecord,
    entity: &str,
    facts: &[ExtractedFact],
    scenes: &[String],
) -> ReconcileOutcome {
    let mut next = record.clone();
    let mut changes = Vec::new();
    let mut conflicts = Vec::new();
    let mut new_appearances = Vec::new();

    for scene in scenes {
        if next.appearances.insert(scene.clone()) {
            new_appearances.push(scene.clone());
        }
    }

    let last_location = facts.iter().rposition(ExtractedFact::is_location);

    for (index, fact) in facts.iter().enumerate() {
        if fact.is_location() && Some(index) != last_location {
            continue;
        }
        let attribute = fact.attribute.as_str();
        let value = fact.value.trim();

        // Overrides are authoritative; contradictions are reported, never applied
        if let Some(manual) = next.manual_overrides.get(attribute) {
            if !value.is_empty()
                && !values_match(manual, value)
                && !next.is_dismissed(attribute, value, &fact.scene)
            {
                conflicts.push(ConflictRecord::hard(
                    entity,
                    attribute,
                    manual,
                    MANUAL_OVERRIDE_SCENE,
                    value,
                    &fact.scene,
                    fact.line,
                ));
            }
            continue;
        }

        if fact.is_location() {
            let new_location = (!value.is_empty()).then(|| value.to_string());
            if !location_matches(next.location.as_deref(), new_location.as_deref()) {
                changes.push(Change {
                    entity: entity.to_string(),
                    attribute: attribute.to_string(),
                    old: next.location.clone(),
                    new: new_location.clone(),
                    scene: fact.scene.clone(),
                });
                next.location = new_location;
            }
            continue;
        }

        if value.is_empty() {
            continue;
        }

        let replacement = StoredAttribute {
            value: value.to_string(),
            source_scene: fact.scene.clone(),
            quote: fact.quote.clone(),
        };
        match next.attributes.get(attribute) {
            None => {
                changes.push(Change {
                    entity: entity.to_string(),
                    attribute: attribute.to_string(),
                    old: None,
                    new: Some(value.to_string()),
                    scene: fact.scene.clone(),
                });
                next.attributes.insert(attribute.to_string(), replacement);
            }
            Some(stored) if values_match(&stored.value, value) => {}
            Some(stored) => {
                if next.is_dismissed(attribute, value, &fact.scene) {
                    changes.push(Change {
                        entity: entity.to_string(),
                        attribute: attribute.to_string(),
                        old: Some(stored.value.clone()),
                        new: Some(value.to_string()),
                        scene: fact.scene.clone(),
                    });
                    next.attributes.insert(attribute.to_string(), replacement);
                } else {
                    conflicts.push(ConflictRecord::hard(
                        entity,
                        attribute,
                        &stored.value,
                        &stored.source_scene,
                        value,
                        &fact.scene,
                        fact.line,
                    ));
                }
            }
        }
    }

    let refreshed = refresh_override_rows(&mut next);
    let needs_write = !changes.is_empty() || !new_appearances.is_empty() || refreshed;

    ReconcileOutcome {
        record: next,
        changes,
        conflicts,
        new_appearances,
        needs_write,
    }
}

/// Point extracted rows of overridden attributes at the override.
///
/// Returns true if any row was rewritten.
pub fn refresh_override_rows(record: &mut EntityRecord) -> bool {
    let mut refreshed = false;
    for (attribute, manual) in &record.manual_overrides {
        if let Some(row) = record.attributes.get_mut(attribute) {
            if row.value != *manual || row.source_scene != MANUAL_OVERRIDE_SCENE {
                row.value = manual.clone();
                row.source_scene = MANUAL_OVERRIDE_SCENE.to_string();
                row.quote.clear();
                refreshed = true;
            }
        }
    }
    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fact::Provenance;
    use crate::models::record::DismissedConflict;
    use pretty_assertions::assert_eq;

    fn fact(attribute: &str, value: &str, scene: &str) -> ExtractedFact {
        ExtractedFact::new(attribute, value, scene, Some(1), "quote", Provenance::Tier1)
    }

    fn scenes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_establishment_is_a_change() {
        let outcome = reconcile(
            &EntityRecord::default(),
            "Elena",
            &[fact("hair", "copper", "ch01.md")],
            &scenes(&["ch01.md"]),
        );
        assert_eq!(outcome.changes.len(), 1);
        assert!(outcome.conflicts.is_empty());
        assert!(outcome.needs_write);
        assert_eq!(outcome.record.attributes["hair"].value, "copper");
        assert_eq!(outcome.record.attributes["hair"].source_scene, "ch01.md");
    }

    #[test]
    fn test_repeat_is_no_write() {
        let first = reconcile(
            &EntityRecord::default(),
            "Elena",
            &[fact("hair", "copper", "ch01.md"), fact("location", "The Vault", "ch01.md")],
            &scenes(&["ch01.md"]),
        );
        let second = reconcile(
            &first.record,
            "Elena",
            &[fact("hair", "Copper", "ch01.md"), fact("location", "the vault", "ch01.md")],
            &scenes(&["ch01.md"]),
        );
        assert!(second.changes.is_empty());
        assert!(second.conflicts.is_empty());
        assert!(!second.needs_write);
        assert_eq!(second.record, first.record);
    }

    #[test]
    fn test_contradiction_keeps_established_value() {
        let mut record = EntityRecord::default();
        record.attributes.insert(
            "eyes".into(),
            StoredAttribute {
                value: "brown".into(),
                source_scene: "ch02.md".into(),
                quote: String::new(),
            },
        );
        record.appearances.insert("ch03.md".into());

        let outcome = reconcile(
            &record,
            "Elena",
            &[fact("eyes", "hazel", "ch03.md")],
            &scenes(&["ch03.md"]),
        );
        assert!(!outcome.needs_write);
        assert_eq!(outcome.record.attributes["eyes"].value, "brown");
        let conflict = &outcome.conflicts[0];
        assert_eq!(
            (
                conflict.prior_value.as_str(),
                conflict.prior_scene.as_str(),
                conflict.new_value.as_str(),
                conflict.new_scene.as_str()
            ),
            ("brown", "ch02.md", "hazel", "ch03.md")
        );
    }

    #[test]
    fn test_dismissed_contradiction_is_applied() {
        let mut record = EntityRecord::default();
        record.attributes.insert(
            "eyes".into(),
            StoredAttribute {
                value: "brown".into(),
                source_scene: "ch02.md".into(),
                quote: String::new(),
            },
        );
        record.add_dismissal(DismissedConflict {
            attribute: "eyes".into(),
            value: "hazel".into(),
            scene: "ch03.md".into(),
            note: None,
            date: "2026-01-01".into(),
        });

        let outcome = reconcile(&record, "Elena", &[fact("eyes", "hazel", "ch03.md")], &[]);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(
            outcome.changes,
            vec![Change {
                entity: "Elena".into(),
                attribute: "eyes".into(),
                old: Some("brown".into()),
                new: Some("hazel".into()),
                scene: "ch03.md".into(),
            }]
        );
        assert_eq!(outcome.record.attributes["eyes"].value, "hazel");
    }

    #[test]
    fn test_manual_override_conflict_uses_sentinel() {
        let mut record = EntityRecord::default();
        record
            .manual_overrides
            .insert("hair".into(), "silver".into());

        let outcome = reconcile(&record, "Elena", &[fact("hair", "copper", "ch01.md")], &[]);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].prior_scene, MANUAL_OVERRIDE_SCENE);
        assert_eq!(outcome.conflicts[0].prior_value, "silver");
        assert!(outcome.changes.is_empty());
        assert!(!outcome.record.attributes.contains_key("hair"));
    }

    #[test]
    fn test_manual_override_agreeing_fact_is_silent() {
        let mut record = EntityRecord::default();
        record
            .manual_overrides
            .insert("hair".into(), "silver".into());
        let outcome = reconcile(&record, "Elena", &[fact("hair", "Silver", "ch01.md")], &[]);
        assert!(outcome.conflicts.is_empty());
        assert!(!outcome.needs_write);
    }

    #[test]
    fn test_override_row_refresh_triggers_write() {
        let mut record = EntityRecord::default();
        record.attributes.insert(
            "hair".into(),
            StoredAttribute {
                value: "copper".into(),
                source_scene: "ch01.md".into(),
                quote: "q".into(),
            },
        );
        record
            .manual_overrides
            .insert("hair".into(), "silver".into());

        let outcome = reconcile(&record, "Elena", &[], &[]);
        assert!(outcome.needs_write);
        assert_eq!(outcome.record.attributes["hair"].value, "silver");
        assert_eq!(
            outcome.record.attributes["hair"].source_scene,
            MANUAL_OVERRIDE_SCENE
        );

        let again = reconcile(&outcome.record, "Elena", &[], &[]);
        assert!(!again.needs_write);
    }

    #[test]
    fn test_location_enter_then_leave() {
        let entered = reconcile(
            &EntityRecord::default(),
            "Elena",
            &[fact("location", "The Vault", "ch01.md")],
            &[],
        );
        assert_eq!(entered.record.location.as_deref(), Some("The Vault"));

        let left = reconcile(&entered.record, "Elena", &[fact("location", "", "ch02.md")], &[]);
        assert_eq!(left.record.location, None);
        assert_eq!(left.changes[0].old.as_deref(), Some("The Vault"));
        assert_eq!(left.changes[0].new, None);
        assert!(left.conflicts.is_empty());
    }

    #[test]
    fn test_only_last_location_fact_counts() {
        let facts = [
            fact("location", "The Vault", "ch01.md"),
            fact("location", "", "ch01.md"),
        ];
        let first = reconcile(&EntityRecord::default(), "Elena", &facts, &scenes(&["ch01.md"]));
        assert!(first.changes.is_empty());
        assert_eq!(first.record.location, None);

        let second = reconcile(&first.record, "Elena", &facts, &scenes(&["ch01.md"]));
        assert!(second.changes.is_empty());
        assert!(!second.needs_write);
    }

    #[test]
    fn test_empty_ordinary_value_ignored() {
        let outcome = reconcile(&EntityRecord::default(), "Elena", &[fact("hair", " ", "ch01.md")], &[]);
        assert!(outcome.changes.is_empty());
        assert!(!outcome.needs_write);
    }

    #[test]
    fn test_new_appearance_alone_triggers_write() {
        let outcome = reconcile(&EntityRecord::default(), "Elena", &[], &scenes(&["ch09.md"]));
        assert!(outcome.needs_write);
        assert_eq!(outcome.new_appearances, vec!["ch09.md".to_string()]);
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_fact() -> impl Strategy<Value = ExtractedFact> {
            (
                prop::sample::select(vec!["hair", "eyes", "location", "scar"]),
                "[a-z]{0,6}",
                prop::sample::select(vec!["a.md", "b.md", "c.md"]),
            )
                .prop_map(|(attribute, value, scene)| fact(attribute, &value, scene))
        }

        proptest! {
            #[test]
            fn prop_manual_override_never_changes(facts in prop::collection::vec(arb_fact(), 0..20)) {
                let mut record = EntityRecord::default();
                record.manual_overrides.insert("hair".into(), "silver".into());
                let mut current = record;
                for chunk in facts.chunks(3) {
                    current = reconcile(&current, "Elena", chunk, &[]).record;
                    prop_assert_eq!(current.manual_overrides.get("hair").map(String::as_str), Some("silver"));
                    prop_assert_eq!(current.effective_value("hair"), Some("silver"));
                }
            }

            #[test]
            fn prop_reconcile_is_idempotent(facts in prop::collection::vec(arb_fact(), 0..12)) {
                let scenes = vec!["a.md".to_string()];
                let once = reconcile(&EntityRecord::default(), "Elena", &facts, &scenes);
                // a settled record is stable under the same batch
                let settled = reconcile(&once.record, "Elena", &facts, &scenes);
                let third = reconcile(&settled.record, "Elena", &facts, &scenes);
                prop_assert_eq!(&third.record, &settled.record);
                prop_assert!(!third.needs_write);
                prop_assert!(third.changes.is_empty());
            }
        }
    }
}
