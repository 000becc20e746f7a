//! Entity/alias resolution of surface tokens to canonical names.

use crate::models::registry::RegistryEntry;
use crate::utils::text::strip_article;

/// Resolve `token` to the canonical name of the first matching candidate.
///
/// Comparison is case-insensitive and ignores a leading "the " on both
/// sides, so "the Vault", "Vault" and "The Vault" all resolve alike.
pub fn resolve<'a, I>(token: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a RegistryEntry>,
{
    let wanted = strip_article(token).to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    candidates
        .into_iter()
        .find(|entry| {
            entry
                .surface_forms()
                .any(|form| strip_article(form).to_lowercase() == wanted)
        })
        .map(|entry| entry.name.as_str())
}

/// Whether `token` names `entry` (canonical name or alias).
pub fn names_entity(token: &str, entry: &RegistryEntry) -> bool {
    resolve(token, std::iter::once(entry)).is_some()
}
