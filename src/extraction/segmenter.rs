//! Paragraph segmentation and extraction windows.

use serde::Serialize;

/// A paragraph with its 1-based starting line in the original document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub text: String,
    pub start_line: usize,
}

/// Lines that act as hard paragraph boundaries and are dropped.
fn is_structural(line: &str) -> bool {
    let t = line.trim();
    if t.starts_with('#') {
        return true;
    }
    // Thematic breaks: ---, ***, ___, * * *, ~~~
    let marks: String = t.chars().filter(|c| !c.is_whitespace()).collect();
    if marks.len() >= 3 {
        let first = marks.chars().next().unwrap_or(' ');
        if matches!(first, '-' | '*' | '_' | '~' | '=') && marks.chars().all(|c| c == first) {
            return true;
        }
    }
    // Obsidian comment markers and HTML comments on their own line
    t == "%%" || (t.starts_with("%%") && t.ends_with("%%")) || (t.starts_with("<!--") && t.ends_with("-->"))
}

/// Split a document body into paragraphs.
///
/// Blank lines and structural lines (headings, thematic breaks, comment
/// markers) separate paragraphs; structural lines are dropped. `line_offset`
/// is the number of lines removed from the top of the document (e.g. a
/// metadata block) so `start_line` refers to the original document.
pub fn split_paragraphs(body: &str, line_offset: usize) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 0;

    for (idx, raw) in body.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || is_structural(line) {
            if !current.is_empty() {
                paragraphs.push(Paragraph {
                    text: current.join("\n"),
                    start_line,
                });
                current.clear();
            }
            continue;
        }
        if current.is_empty() {
            start_line = idx + 1 + line_offset;
        }
        current.push(line);
    }

    if !current.is_empty() {
        paragraphs.push(Paragraph {
            text: current.join("\n"),
            start_line,
        });
    }

    paragraphs
}

/// Inclusive paragraph index range of the window around paragraph `index`.
pub fn window_bounds(index: usize, radius: usize, paragraph_count: usize) -> (usize, usize) {
    let last = paragraph_count.saturating_sub(1);
    (index.saturating_sub(radius), (index + radius).min(last))
}

/// Joined text of a window, with a map from byte offsets back to source lines.
#[derive(Debug, Clone)]
pub struct Window {
    pub text: String,
    /// (byte offset in `text`, start line) per paragraph, ascending
    anchors: Vec<(usize, usize)>,
}

impl Window {
    pub fn build(paragraphs: &[Paragraph], start: usize, end: usize) -> Self {
        let mut text = String::new();
        let mut anchors = Vec::with_capacity(end.saturating_sub(start) + 1);
        for para in &paragraphs[start..=end] {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            anchors.push((text.len(), para.start_line));
            text.push_str(&para.text);
        }
        Self { text, anchors }
    }

    /// Original-document line of a byte offset inside the window text.
    pub fn line_at(&self, offset: usize) -> usize {
        let (base, line) = self
            .anchors
            .iter()
            .rev()
            .find(|(base, _)| *base <= offset)
            .copied()
            .unwrap_or((0, self.anchors.first().map_or(1, |a| a.1)));
        let end = offset.min(self.text.len());
        let newlines = self.text[base.min(end)..end].matches('\n').count();
        line + newlines
    }
}
