//! Conflict log: dedup, status transitions and re-activation.
//!
//! Invariant: at most one active record per [`ConflictKey`]. Any number of
//! dismissed records may share a key when a slot was contested repeatedly
//! with different values.

use serde::Serialize;

use crate::models::conflict::{ConflictKey, ConflictRecord, ConflictStatus};
use crate::models::registry::entity_key;
use crate::utils::text::values_match;

/// What merging a batch did to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// New active records appended
    pub added: usize,
    /// Active records whose new value/line was refreshed
    pub updated: usize,
    /// Incoming conflicts ignored because that value was already dismissed
    pub suppressed: usize,
}

impl MergeSummary {
    /// Whether the log differs from before the merge.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }

    pub fn absorb(&mut self, other: MergeSummary) {
        self.added += other.added;
        self.updated += other.updated;
        self.suppressed += other.suppressed;
    }
}

/// The full (active + dismissed) conflict list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictLog {
    records: Vec<ConflictRecord>,
}

impl ConflictLog {
    pub fn new(records: Vec<ConflictRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ConflictRecord> {
        self.records
    }

    /// Merge newly detected conflicts.
    ///
    /// - no record for the key: append as active
    /// - an active record: refresh its new value and line in place
    /// - only dismissed records: ignore if the value was dismissed before,
    ///   otherwise append a new active record
    pub fn merge_incoming(&mut self, incoming: Vec<ConflictRecord>) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for mut conflict in incoming {
            let key = conflict.key();

            if let Some(active) = self
                .records
                .iter_mut()
                .find(|r| r.is_active() && r.key() == key)
            {
                if active.new_value != conflict.new_value || active.new_line != conflict.new_line {
                    active.new_value = conflict.new_value;
                    active.new_line = conflict.new_line;
                    summary.updated += 1;
                }
                continue;
            }

            let dismissed_same_value = self.records.iter().any(|r| {
                r.status == ConflictStatus::Dismissed
                    && r.key() == key
                    && values_match(&r.new_value, &conflict.new_value)
            });
            if dismissed_same_value {
                summary.suppressed += 1;
                continue;
            }

            conflict.status = ConflictStatus::Active;
            conflict.note = None;
            conflict.dismissed_at = None;
            self.records.push(conflict);
            summary.added += 1;
        }

        summary
    }

    /// Dismiss every active record for `key`. Returns the records dismissed.
    pub fn dismiss(
        &mut self,
        key: &ConflictKey,
        note: Option<String>,
        date: &str,
    ) -> Vec<ConflictRecord> {
        let mut dismissed = Vec::new();
        for record in self
            .records
            .iter_mut()
            .filter(|r| r.is_active() && r.key() == *key)
        {
            record.status = ConflictStatus::Dismissed;
            record.note = note.clone();
            record.dismissed_at = Some(date.to_string());
            dismissed.push(record.clone());
        }
        dismissed
    }

    pub fn find_active(&self, key: &ConflictKey) -> Option<&ConflictRecord> {
        self.records.iter().find(|r| r.is_active() && r.key() == *key)
    }

    /// Active records, optionally for one entity.
    pub fn active(&self, entity: Option<&str>) -> Vec<&ConflictRecord> {
        let wanted = entity.map(entity_key);
        self.records
            .iter()
            .filter(|r| r.is_active())
            .filter(|r| wanted.as_ref().is_none_or(|w| entity_key(&r.entity) == *w))
            .collect()
    }

    /// All records (any status), optionally for one entity.
    pub fn all(&self, entity: Option<&str>) -> Vec<&ConflictRecord> {
        let wanted = entity.map(entity_key);
        self.records
            .iter()
            .filter(|r| wanted.as_ref().is_none_or(|w| entity_key(&r.entity) == *w))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conflict(value: &str, line: usize) -> ConflictRecord {
        ConflictRecord::hard("Elena", "eyes", "brown", "ch02.md", value, "ch03.md", Some(line))
    }

    fn key() -> ConflictKey {
        ConflictKey::new("Elena", "eyes", "ch03.md")
    }

    #[test]
    fn test_new_conflict_is_appended() {
        let mut log = ConflictLog::default();
        let summary = log.merge_incoming(vec![conflict("hazel", 4)]);
        assert_eq!(summary.added, 1);
        assert_eq!(log.active(None).len(), 1);
    }

    #[test]
    fn test_active_conflict_updated_in_place() {
        let mut log = ConflictLog::default();
        log.merge_incoming(vec![conflict("lic", 4)]);
        let summary = log.merge_incoming(vec![conflict("lilac", 5)]);

        assert_eq!(
            summary,
            MergeSummary {
                added: 0,
                updated: 1,
                suppressed: 0
            }
        );
        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].new_value, "lilac");
        assert_eq!(log.records()[0].new_line, Some(5));
    }

    #[test]
    fn test_identical_conflict_is_not_a_change() {
        let mut log = ConflictLog::default();
        log.merge_incoming(vec![conflict("hazel", 4)]);
        let summary = log.merge_incoming(vec![conflict("hazel", 4)]);
        assert!(!summary.changed());
    }

    #[test]
    fn test_dismissed_same_value_suppressed() {
        let mut log = ConflictLog::default();
        log.merge_incoming(vec![conflict("hazel", 4)]);
        let dismissed = log.dismiss(&key(), Some("intentional".into()), "2026-03-01");
        assert_eq!(dismissed.len(), 1);
        assert_eq!(dismissed[0].note.as_deref(), Some("intentional"));

        let summary = log.merge_incoming(vec![conflict("Hazel", 4)]);
        assert_eq!(summary.suppressed, 1);
        assert!(log.active(None).is_empty());
    }

    #[test]
    fn test_dismissed_different_value_reactivates() {
        let mut log = ConflictLog::default();
        log.merge_incoming(vec![conflict("hazel", 4)]);
        log.dismiss(&key(), None, "2026-03-01");

        let summary = log.merge_incoming(vec![conflict("green", 4)]);
        assert_eq!(summary.added, 1);
        assert_eq!(log.records().len(), 2);
        assert_eq!(log.find_active(&key()).map(|r| r.new_value.as_str()), Some("green"));
    }

    #[test]
    fn test_active_filter_by_entity() {
        let mut log = ConflictLog::default();
        log.merge_incoming(vec![
            conflict("hazel", 4),
            ConflictRecord::hard("Marcus", "beard", "grey", "a.md", "black", "b.md", None),
        ]);
        assert_eq!(log.active(Some("marcus")).len(), 1);
        assert_eq!(log.active(Some("ELENA")).len(), 1);
        assert_eq!(log.all(None).len(), 2);
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        #[derive(Debug, Clone)]
        enum Op {
            Merge(usize, String),
            Dismiss(usize),
        }

        fn scene(i: usize) -> String {
            format!("ch{:02}.md", i)
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..3, "[a-c]{1,2}").prop_map(|(s, v)| Op::Merge(s, v)),
                (0usize..3).prop_map(Op::Dismiss),
            ]
        }

        proptest! {
            #[test]
            fn prop_at_most_one_active_per_key(ops in prop::collection::vec(arb_op(), 0..40)) {
                let mut log = ConflictLog::default();
                for op in ops {
                    match op {
                        Op::Merge(s, v) => {
                            log.merge_incoming(vec![ConflictRecord::hard(
                                "Elena", "eyes", "brown", "ch00.md", &v, &scene(s), None,
                            )]);
                        }
                        Op::Dismiss(s) => {
                            log.dismiss(&ConflictKey::new("Elena", "eyes", &scene(s)), None, "2026-01-01");
                        }
                    }
                    let mut active: HashMap<ConflictKey, usize> = HashMap::new();
                    for record in log.records().iter().filter(|r| r.is_active()) {
                        *active.entry(record.key()).or_default() += 1;
                    }
                    prop_assert!(active.values().all(|n| *n <= 1));
                }
            }
        }
    }
}
