//! Pattern library: lexical patterns and the attribute-noun dictionary.
//!
//! Everything here is pure. Patterns are compiled per entity from its
//! surface forms; the noun/value boundary resolution is kept separate from
//! the regexes so it can be tested on its own.

use regex::Regex;

use crate::extraction::resolver::names_entity;
use crate::models::fact::COMPLEXION_ATTRIBUTE;
use crate::models::registry::RegistryEntry;
use crate::utils::text::strip_article;
use crate::BibleError;

// ============================================================================
// Dictionaries
// ============================================================================

/// Attribute category → nouns that name it. Nouns match by prefix, so
/// "eyes" matches "eye" and "curls" matches "curl".
pub const NOUN_DICTIONARY: &[(&str, &[&str])] = &[
    ("hair", &["hair", "lock", "curl", "braid", "mane", "tress"]),
    ("eyes", &["eye", "gaze"]),
    ("skin", &["skin"]),
    ("build", &["build", "physique", "frame", "figure"]),
    ("height", &["height", "stature"]),
    ("beard", &["beard", "stubble", "moustache", "mustache"]),
    ("scar", &["scar"]),
    ("voice", &["voice"]),
    ("nose", &["nose"]),
    ("age", &["age"]),
];

/// Adjectives recognised by the appositive-clause pattern.
pub const COMPLEXION_ADJECTIVES: &[&str] = &[
    "pale",
    "fair",
    "freckled",
    "tanned",
    "sunburnt",
    "sunburned",
    "olive",
    "ruddy",
    "swarthy",
    "sallow",
    "bronzed",
    "dusky",
    "ashen",
    "weathered",
    "porcelain",
    "dark-skinned",
    "light-skinned",
    "brown-skinned",
];

/// Words that are never attribute values; a candidate containing one is dropped.
const STOP_VALUES: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "of", "in", "on", "at", "to", "with", "for", "from",
    "her", "his", "their", "its", "my", "your", "our", "him", "them", "she", "he", "it", "they",
    "not", "no", "never", "still", "very", "so", "too", "always", "also", "just", "now", "then",
    "been", "being", "was", "were", "is", "are", "had", "has", "have", "that", "this", "what",
];

/// Words that end a copula value ("brown when she smiled" → "brown").
const CLAUSE_BOUNDARIES: &[&str] = &[
    "when", "whenever", "while", "as", "like", "because", "though", "although", "if", "since",
    "until", "before", "after", "once", "again",
];

/// Suffixes stripped from compound-adjective noun parts ("haired" → "hair").
const COMPOUND_SUFFIXES: &[&str] = &["red", "ed", "en"];

/// Attribute categories owned by Tier 1.
pub fn tier1_categories() -> impl Iterator<Item = &'static str> {
    NOUN_DICTIONARY
        .iter()
        .map(|(category, _)| *category)
        .chain([COMPLEXION_ATTRIBUTE, crate::models::fact::LOCATION_ATTRIBUTE])
}

pub fn is_tier1_category(attribute: &str) -> bool {
    tier1_categories().any(|c| c == attribute)
}

// ============================================================================
// Resolution Functions
// ============================================================================

/// Category of a noun, matched by dictionary prefix.
pub fn classify_noun(word: &str) -> Option<&'static str> {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return None;
    }
    NOUN_DICTIONARY
        .iter()
        .find(|(_, nouns)| nouns.iter().any(|noun| word.starts_with(noun)))
        .map(|(category, _)| *category)
}

/// Category of the noun part of a compound adjective ("haired", "scarred").
///
/// Tries the suffix as-is, then with a trailing "-red", "-ed" or "-en" removed.
pub fn classify_compound_suffix(suffix: &str) -> Option<&'static str> {
    let suffix = suffix.to_lowercase();
    classify_noun(&suffix).or_else(|| {
        COMPOUND_SUFFIXES
            .iter()
            .filter_map(|ending| suffix.strip_suffix(ending))
            .filter(|stem| !stem.is_empty())
            .find_map(classify_noun)
    })
}

/// Normalise a captured value; `None` if it is empty or contains a stop word.
pub fn clean_value(raw: &str) -> Option<String> {
    let words: Vec<String> = strip_article(raw)
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || words.iter().any(|w| STOP_VALUES.contains(&w.as_str())) {
        return None;
    }
    Some(words.join(" "))
}

/// Resolve a `<value> <noun>` capture pair into (category, value).
///
/// The value capture is greedy and may have swallowed the noun when the
/// sentence continues past it. First the noun capture is classified; if it
/// is not a known noun, the last word of the value capture is tried as the
/// noun and the remaining words become the value.
pub fn resolve_noun_value(value_group: &str, noun_group: &str) -> Option<(&'static str, String)> {
    if let Some(category) = classify_noun(noun_group) {
        return clean_value(value_group).map(|value| (category, value));
    }

    let mut words: Vec<&str> = value_group.split_whitespace().collect();
    let candidate = words.pop()?;
    let category = classify_noun(candidate)?;
    clean_value(&words.join(" ")).map(|value| (category, value))
}

/// Leading adjective run of a copula capture, cut at the first stop word or
/// clause boundary. A leading article is skipped.
fn leading_value(raw: &str) -> String {
    let mut words = raw.split_whitespace().peekable();
    if words
        .peek()
        .is_some_and(|w| ["a", "an", "the"].contains(&w.to_lowercase().as_str()))
    {
        words.next();
    }
    words
        .take_while(|w| {
            let w = w.to_lowercase();
            !STOP_VALUES.contains(&w.as_str()) && !CLAUSE_BOUNDARIES.contains(&w.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a `<noun> <copula> <value>` capture pair. The noun capture may
/// carry leading adjectives ("long hair"); its last word is the noun. The
/// value capture may run past the value into the rest of the clause.
pub fn resolve_copula(noun_group: &str, value_group: &str) -> Option<(&'static str, String)> {
    let noun = noun_group.split_whitespace().last()?;
    let category = classify_noun(noun)?;
    clean_value(&leading_value(value_group)).map(|value| (category, value))
}

/// First complexion adjective in an appositive clause.
pub fn first_complexion(clause: &str) -> Option<String> {
    clause
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .to_lowercase()
        })
        .find(|w| COMPLEXION_ADJECTIVES.contains(&w.as_str()))
}

// ============================================================================
// Compiled Patterns
// ============================================================================

/// Which way a location statement points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Entered,
    ArrivedAt,
    WasIn,
    /// Clearing: the entity is no longer at the location
    Left,
}

impl Movement {
    pub const ALL: [Movement; 4] = [
        Movement::Entered,
        Movement::ArrivedAt,
        Movement::WasIn,
        Movement::Left,
    ];

    pub fn is_clearing(&self) -> bool {
        matches!(self, Movement::Left)
    }

    fn verbs(&self) -> &'static str {
        match self {
            Movement::Entered => {
                r"entered|walked\s+into|stepped\s+into|went\s+into|came\s+into|ran\s+into|slipped\s+into|moved\s+into|headed\s+into|returned\s+to|went\s+to"
            }
            Movement::ArrivedAt => r"arrived\s+(?:at|in)|reached|got\s+to|made\s+it\s+to",
            Movement::WasIn => {
                r"(?:was|is|stood|sat|waited|remained|stayed|lingered|hid)\s+(?:in|at|inside)"
            }
            Movement::Left => {
                r"left|departed(?:\s+from)?|fled(?:\s+from)?|exited|escaped(?:\s+from)?|walked\s+out\s+of|stepped\s+out\s+of|ran\s+out\s+of"
            }
        }
    }
}

/// A location statement found in window text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMatch {
    pub movement: Movement,
    /// Byte offset of the match in the window text
    pub offset: usize,
    /// Captured target token, if any
    pub target: Option<String>,
}

/// Regex alternation of surface forms, longest first, whitespace-tolerant.
fn alternation<'a>(forms: impl IntoIterator<Item = &'a str>) -> String {
    let mut forms: Vec<String> = forms
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    forms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    forms.dedup();
    forms.join("|")
}

fn compile(pattern: &str) -> Result<Regex, BibleError> {
    Regex::new(pattern)
        .map_err(|e| BibleError::Validation(format!("Invalid extraction pattern: {}", e)))
}

const WORD: &str = r"[\p{L}][\p{L}-]*";
const POSSESSIVE: &str = r"(?:'|’)s";

/// All patterns for one character, compiled once per registry snapshot.
#[derive(Debug)]
pub struct EntityPatterns {
    entity: RegistryEntry,
    possessive_copula: Regex,
    possessive_adjective: Regex,
    verb_attribution: Regex,
    compound_prenominal: Regex,
    appositive: Regex,
    movements: Vec<(Movement, Regex)>,
}

impl EntityPatterns {
    /// Compile the pattern set for `entity` against the registered locations.
    pub fn compile(entity: &RegistryEntry, locations: &[&RegistryEntry]) -> Result<Self, BibleError> {
        let names = alternation(entity.surface_forms());
        if names.is_empty() {
            return Err(BibleError::Validation(format!(
                "Entity '{}' has no usable surface form",
                entity.name
            )));
        }

        let possessive_copula = compile(&format!(
            r"(?i)\b(?:{names}){POSSESSIVE}\s+({WORD}(?:\s+{WORD}){{0,2}}?)\s+(?:is|was|were|are|became|had\s+become|has\s+become|turned|looked|seemed|remained)\s+((?:(?:a|an|the)\s+)?{WORD}(?:\s+{WORD}){{0,2}})"
        ))?;
        let possessive_adjective = compile(&format!(
            r"(?i)\b(?:{names}){POSSESSIVE}\s+({WORD}(?:\s+{WORD})?)\s+({WORD})"
        ))?;
        let verb_attribution = compile(&format!(
            r"(?i)\b(?:{names})\s+(?:had|has|wore|wears|bore|bears|sported|sports|possessed)\s+(?:(?:a|an|the)\s+)?({WORD}(?:\s+{WORD})?)\s+({WORD})"
        ))?;
        let compound_prenominal = compile(&format!(
            r"(?i)\b(\p{{L}}+)-(\p{{L}}+)\s+(?:{names})\b"
        ))?;
        let appositive = compile(&format!(r"(?i)\b(?:{names}),\s+([^,.;!?\n]{{1,120}}),"))?;

        let stripped_locations = alternation(
            locations
                .iter()
                .flat_map(|loc| loc.surface_forms())
                .map(strip_article),
        );
        let target = if stripped_locations.is_empty() {
            r"[\p{L}][\p{L}'’-]*".to_string()
        } else {
            format!(r"(?:the\s+)?(?:{stripped_locations})\b|[\p{{L}}][\p{{L}}'’-]*")
        };

        let mut movements = Vec::with_capacity(Movement::ALL.len());
        for movement in Movement::ALL {
            let verbs = movement.verbs();
            let pattern = if movement.is_clearing() {
                format!(r"(?i)\b(?P<who>{names})\s+(?:{verbs})\b(?:\s+(?P<target>{target}))?")
            } else {
                format!(r"(?i)\b(?P<who>{names})\s+(?:{verbs})\b\s+(?P<target>{target})")
            };
            movements.push((movement, compile(&pattern)?));
        }

        Ok(Self {
            entity: entity.clone(),
            possessive_copula,
            possessive_adjective,
            verb_attribution,
            compound_prenominal,
            appositive,
            movements,
        })
    }

    pub fn entity(&self) -> &RegistryEntry {
        &self.entity
    }

    /// Run the attribute patterns in priority order.
    ///
    /// Returns `(offset, category, value)` for every match, pattern by
    /// pattern; the caller keeps the first value per category.
    pub fn attribute_matches(&self, text: &str) -> Vec<(usize, &'static str, String)> {
        let mut out = Vec::new();

        for caps in self.possessive_copula.captures_iter(text) {
            let (Some(all), Some(noun), Some(value)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if let Some((category, value)) = resolve_copula(noun.as_str(), value.as_str()) {
                out.push((all.start(), category, value));
            }
        }

        for regex in [&self.possessive_adjective, &self.verb_attribution] {
            for caps in regex.captures_iter(text) {
                let (Some(all), Some(value), Some(noun)) = (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                if let Some((category, value)) = resolve_noun_value(value.as_str(), noun.as_str()) {
                    out.push((all.start(), category, value));
                }
            }
        }

        for caps in self.compound_prenominal.captures_iter(text) {
            let (Some(all), Some(value), Some(suffix)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if let (Some(category), Some(value)) =
                (classify_compound_suffix(suffix.as_str()), clean_value(value.as_str()))
            {
                out.push((all.start(), category, value));
            }
        }

        for caps in self.appositive.captures_iter(text) {
            let (Some(all), Some(clause)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Some(value) = first_complexion(clause.as_str()) {
                out.push((all.start(), COMPLEXION_ATTRIBUTE, value));
            }
        }

        out
    }

    /// All location statements about this entity in `text`.
    pub fn location_matches(&self, text: &str) -> Vec<LocationMatch> {
        let mut out = Vec::new();
        for (movement, regex) in &self.movements {
            for caps in regex.captures_iter(text) {
                let Some(all) = caps.get(0) else { continue };
                let confirmed = caps
                    .name("who")
                    .is_some_and(|who| names_entity(who.as_str(), &self.entity));
                if !confirmed {
                    continue;
                }
                out.push(LocationMatch {
                    movement: *movement,
                    offset: all.start(),
                    target: caps.name("target").map(|t| t.as_str().to_string()),
                });
            }
        }
        out
    }
}
