//! Scene documents: the prose the engine reads (and never writes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scene's content as handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Scene identifier (path relative to the manuscript root)
    pub path: String,
    pub content: String,
    pub modified: DateTime<Utc>,
}

impl SceneDocument {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            modified: Utc::now(),
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    /// Body with the metadata block removed, plus the number of lines removed.
    pub fn body(&self) -> (&str, usize) {
        split_front_matter(&self.content)
    }
}

/// Strip a leading `---` delimited metadata block.
///
/// Returns the remaining body and how many lines were consumed so that line
/// numbers in the body can be mapped back onto the original document. An
/// unterminated block is treated as prose.
pub fn split_front_matter(text: &str) -> (&str, usize) {
    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {}
        _ => return (text, 0),
    }

    let mut consumed = text.split_inclusive('\n').next().map_or(0, str::len);
    let mut line_count = 1;
    for line in lines {
        consumed += line.len();
        line_count += 1;
        if line.trim_end() == "---" {
            return (&text[consumed..], line_count);
        }
    }
    (text, 0)
}
