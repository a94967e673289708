//! Immutable line-addressed source text.
//!
//! Every diagnostic and patch in this crate addresses lines of a
//! `SourceDocument` by 1-indexed number. Documents are never edited in place;
//! splicing returns a new document.

use std::fmt;

/// An immutable, ordered sequence of source lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDocument {
    lines: Vec<String>,
}

impl SourceDocument {
    /// Split `text` on `\n`. The line count is always `text.split('\n').count()`,
    /// so an empty text is a single empty line.
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(String::from).collect(),
        }
    }

    /// Build a document from already-split lines.
    pub fn from_lines(lines: Vec<String>) -> Self {
        if lines.is_empty() {
            return Self {
                lines: vec![String::new()],
            };
        }
        Self { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line by 1-indexed number.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(String::as_str)
    }

    /// All lines, 0-indexed.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Iterate `(line_number, text)` pairs with 1-indexed numbers.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.as_str()))
    }

    /// Re-join the document into text.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Replace lines `[start, end]` (1-indexed, inclusive) with `replacement`.
    ///
    /// `end < start` removes nothing and inserts before `start`. Callers are
    /// responsible for bounds; `start` may be at most `line_count() + 1`.
    pub fn splice(&self, start: usize, end: usize, replacement: &str) -> Self {
        let from = start.saturating_sub(1).min(self.lines.len());
        let to = end.min(self.lines.len()).max(from);

        let mut lines = Vec::with_capacity(self.lines.len() + 4);
        lines.extend_from_slice(&self.lines[..from]);
        lines.extend(replacement.split('\n').map(String::from));
        lines.extend_from_slice(&self.lines[to..]);
        Self::from_lines(lines)
    }
}

impl fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<&str> for SourceDocument {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
