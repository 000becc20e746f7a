//! CLI command handlers.

pub mod conflict;
pub mod record;
pub mod scan;

use colored::Colorize;
use rapidfuzz::distance::levenshtein;

use crate::models::registry::Registry;

const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Registered names close to `input`, best match first.
pub fn suggest_names(registry: &Registry, input: &str, limit: usize) -> Vec<String> {
    let input_lower = input.trim().to_lowercase();
    let mut scored: Vec<(f64, &str)> = registry
        .entries
        .iter()
        .filter_map(|entry| {
            let best = entry
                .surface_forms()
                .map(|form| {
                    levenshtein::normalized_similarity(
                        input_lower.chars(),
                        form.to_lowercase().chars(),
                    )
                })
                .fold(0.0_f64, f64::max);
            (best >= SUGGESTION_THRESHOLD).then_some((best, entry.name.as_str()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Canonical name for a CLI entity argument.
///
/// Unknown names are passed through unchanged (the bible may still hold
/// records for entities since removed from the registry) after printing
/// close-match suggestions.
pub fn resolve_entity(registry: &Registry, input: &str) -> String {
    if let Some(entry) = registry.find(input) {
        return entry.name.clone();
    }

    // stderr: stdout may be carrying --json output
    let suggestions = suggest_names(registry, input, 3);
    let hint = if suggestions.is_empty() {
        format!("'{}' is not in the registry", input)
    } else {
        format!(
            "'{}' is not in the registry. Did you mean: {}?",
            input,
            suggestions.join(", ")
        )
    };
    eprintln!("{}", hint.dimmed());
    input.trim().to_string()
}
