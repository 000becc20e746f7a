//! Small string helpers shared by extraction and reconciliation.

/// Keep at most `limit` whitespace-separated words, joined by single spaces.
pub fn truncate_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical comparison form for attribute values.
pub fn normalize_value(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trim- and case-insensitive value equality.
pub fn values_match(a: &str, b: &str) -> bool {
    normalize_value(a) == normalize_value(b)
}

/// Remove a leading "the " article (case-insensitive).
pub fn strip_article(token: &str) -> &str {
    let trimmed = token.trim();
    match trimmed.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("the ") => trimmed[4..].trim_start(),
        _ => trimmed,
    }
}

/// The sentence of `text` that contains byte offset `at`.
///
/// Sentences end at `.`, `!`, `?` or a line break. The result is trimmed.
pub fn sentence_at(text: &str, at: usize) -> &str {
    let at = at.min(text.len());
    let is_end = |c: char| matches!(c, '.' | '!' | '?' | '\n');

    let start = text[..at]
        .char_indices()
        .rev()
        .find(|&(_, c)| is_end(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let end = text[at..]
        .char_indices()
        .find(|&(_, c)| is_end(c))
        .map_or(text.len(), |(i, c)| {
            if c == '\n' {
                at + i
            } else {
                at + i + c.len_utf8()
            }
        });

    text[start..end].trim()
}
