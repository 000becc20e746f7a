//! Tier-1 extraction: lexical patterns applied in windows around mentions.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use tracing::{debug, warn};

use crate::extraction::patterns::{EntityPatterns, LocationMatch};
use crate::extraction::resolver::resolve;
use crate::extraction::segmenter::{split_paragraphs, window_bounds, Paragraph, Window};
use crate::models::fact::{EntityFacts, ExtractedFact, Provenance, LOCATION_ATTRIBUTE};
use crate::models::registry::{EntityKind, Registry, RegistryEntry};
use crate::utils::text::sentence_at;

/// Result of running Tier 1 over one scene.
#[derive(Debug, Clone, Default)]
pub struct Tier1Output {
    /// One entry per mentioned character, in registry order
    pub entities: Vec<EntityFacts>,
    /// Number of pattern-matching passes (one per window)
    pub windows_scanned: usize,
}

/// Pattern sets compiled for one registry snapshot and window radius.
#[derive(Debug)]
pub struct Tier1Extractor {
    radius: usize,
    patterns: Vec<EntityPatterns>,
    locations: Vec<RegistryEntry>,
}

impl Tier1Extractor {
    pub fn new(registry: &Registry, radius: usize) -> Self {
        let locations = registry.locations();
        let patterns = registry
            .of_kind(EntityKind::Character)
            .filter(|e| !e.excluded)
            .filter_map(|entry| match EntityPatterns::compile(entry, &locations) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Skipping '{}': {}", entry.name, e);
                    None
                }
            })
            .collect();

        Self {
            radius,
            patterns,
            locations: locations.into_iter().cloned().collect(),
        }
    }

    /// Cache key for a registry snapshot and radius.
    pub fn fingerprint(registry: &Registry, radius: usize) -> String {
        let mut hasher = DefaultHasher::new();
        radius.hash(&mut hasher);
        for entry in &registry.entries {
            entry.name.hash(&mut hasher);
            entry.aliases.hash(&mut hasher);
            entry.kind.hash(&mut hasher);
            entry.scope.hash(&mut hasher);
            entry.excluded.hash(&mut hasher);
        }
        format!("{:x}", hasher.finish())
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Extract facts from a scene body.
    ///
    /// `line_offset` is the number of metadata lines stripped from the top of
    /// the document, so reported lines refer to the original file.
    pub fn extract(&self, scene: &str, body: &str, line_offset: usize) -> Tier1Output {
        let paragraphs = split_paragraphs(body, line_offset);
        let lowered: Vec<String> = paragraphs.iter().map(|p| p.text.to_lowercase()).collect();
        let mut output = Tier1Output::default();

        for patterns in &self.patterns {
            let entity = patterns.entity();
            if !entity.applies_to_scene(scene) {
                continue;
            }
            let forms: Vec<String> = entity.surface_forms().map(str::to_lowercase).collect();

            let mut visited = vec![false; paragraphs.len()];
            let mut mentioned = false;
            let mut facts = EntityFacts::new(entity.name.clone());

            for index in 0..paragraphs.len() {
                if visited[index] || !forms.iter().any(|f| lowered[index].contains(f.as_str())) {
                    continue;
                }
                mentioned = true;

                let (start, end) = window_bounds(index, self.radius, paragraphs.len());
                visited[start..=end].iter_mut().for_each(|v| *v = true);
                output.windows_scanned += 1;

                for fact in self.window_facts(patterns, scene, &paragraphs, start, end) {
                    let duplicate = facts.facts.iter().any(|f| {
                        f.attribute == fact.attribute && f.value == fact.value && f.line == fact.line
                    });
                    if !duplicate {
                        facts.facts.push(fact);
                    }
                }
            }

            if mentioned {
                debug!(
                    "{}: {} fact(s) for {}",
                    scene,
                    facts.facts.len(),
                    entity.name
                );
                output.entities.push(facts);
            }
        }

        output
    }

    /// Run every pattern once over one window.
    fn window_facts(
        &self,
        patterns: &EntityPatterns,
        scene: &str,
        paragraphs: &[Paragraph],
        start: usize,
        end: usize,
    ) -> Vec<ExtractedFact> {
        let window = Window::build(paragraphs, start, end);
        let mut facts = Vec::new();

        // Earlier patterns win a category for the whole window
        let mut taken = HashSet::new();
        for (offset, category, value) in patterns.attribute_matches(&window.text) {
            if taken.insert(category) {
                facts.push(ExtractedFact::new(
                    category,
                    value,
                    scene,
                    Some(window.line_at(offset)),
                    sentence_at(&window.text, offset),
                    Provenance::Tier1,
                ));
            }
        }

        let latest = patterns
            .location_matches(&window.text)
            .into_iter()
            .filter_map(|m| self.location_value(&m).map(|value| (m.offset, value)))
            .max_by_key(|(offset, _)| *offset);
        if let Some((offset, value)) = latest {
            facts.push(ExtractedFact::new(
                LOCATION_ATTRIBUTE,
                value,
                scene,
                Some(window.line_at(offset)),
                sentence_at(&window.text, offset),
                Provenance::Tier1,
            ));
        }

        facts
    }

    /// Registered location name for a match, or "" for a clearing verb.
    fn location_value(&self, found: &LocationMatch) -> Option<String> {
        if found.movement.is_clearing() {
            return Some(String::new());
        }
        let target = found.target.as_deref()?;
        resolve(target, &self.locations).map(str::to_string)
    }
}
