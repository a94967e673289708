//! Patch applier: line-addressed replacements onto a [`SourceDocument`].
//!
//! A [`PatchSpec`] carries up to three shapes of fix, resolved in strict
//! priority order (never merged):
//!
//! 1. `correctedCode`: full replacement, every line is marked changed.
//! 2. `patches`: an array, applied in descending `lineStart` order so that
//!    not-yet-applied patches keep their original line addresses.
//! 3. `patch`: a single legacy patch.
//!
//! Patches come from a non-deterministic producer, so malformed ones are
//! clamped or skipped and reported, never panicked on.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::source::SourceDocument;

/// Replace lines `[line_start, line_end]` (1-indexed, inclusive) with
/// `replacement_text`, which may itself span several lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    #[serde(alias = "line_start")]
    pub line_start: usize,
    #[serde(alias = "line_end")]
    pub line_end: usize,
    #[serde(alias = "replacement_text", default)]
    pub replacement_text: String,
}

impl Patch {
    pub fn new(line_start: usize, line_end: usize, replacement_text: impl Into<String>) -> Self {
        Self {
            line_start,
            line_end,
            replacement_text: replacement_text.into(),
        }
    }

    /// Replace a single line.
    pub fn line(line: usize, replacement_text: impl Into<String>) -> Self {
        Self::new(line, line, replacement_text)
    }
}

/// A fix in any of its accepted shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSpec {
    #[serde(default, alias = "corrected_code", skip_serializing_if = "Option::is_none")]
    pub corrected_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<Patch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
}

impl PatchSpec {
    pub fn corrected(code: impl Into<String>) -> Self {
        Self {
            corrected_code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn many(patches: Vec<Patch>) -> Self {
        Self {
            patches: Some(patches),
            ..Self::default()
        }
    }

    pub fn single(patch: Patch) -> Self {
        Self {
            patch: Some(patch),
            ..Self::default()
        }
    }

    /// True when no shape is present at all.
    pub fn is_empty(&self) -> bool {
        self.corrected_code.is_none() && self.patches.is_none() && self.patch.is_none()
    }
}

/// Why a patch was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `line_start > line_end` as supplied.
    Inverted,
    /// `line_start` beyond `line_count + 1`.
    OutOfRange,
    /// Touches lines an already-applied patch replaced.
    Overlap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPatch {
    pub patch: Patch,
    pub reason: SkipReason,
}

/// Result of applying a [`PatchSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub document: SourceDocument,
    /// 1-indexed lines of `document` introduced by the applied patches.
    pub changed_lines: BTreeSet<usize>,
    pub skipped: Vec<SkippedPatch>,
}

impl PatchOutcome {
    fn unchanged(doc: &SourceDocument) -> Self {
        Self {
            document: doc.clone(),
            changed_lines: BTreeSet::new(),
            skipped: Vec::new(),
        }
    }
}

/// Apply `spec` to `doc`.
pub fn apply(doc: &SourceDocument, spec: &PatchSpec) -> PatchOutcome {
    if let Some(code) = &spec.corrected_code {
        let document = SourceDocument::new(code);
        let changed_lines = (1..=document.line_count()).collect();
        debug!(lines = document.line_count(), "Applied full replacement");
        return PatchOutcome {
            document,
            changed_lines,
            skipped: Vec::new(),
        };
    }
    if let Some(patches) = &spec.patches {
        return apply_many(doc, patches);
    }
    if let Some(patch) = &spec.patch {
        return apply_many(doc, std::slice::from_ref(patch));
    }
    PatchOutcome::unchanged(doc)
}

/// Apply a patch array in descending `line_start` order.
pub fn apply_many(doc: &SourceDocument, patches: &[Patch]) -> PatchOutcome {
    let mut ordered: Vec<&Patch> = patches.iter().collect();
    // Stable: equal starts keep their supplied order, and the later one
    // is then rejected as an overlap.
    ordered.sort_by(|a, b| b.line_start.cmp(&a.line_start));

    let original_count = doc.line_count();
    let mut outcome = PatchOutcome::unchanged(doc);
    let mut markers: Vec<usize> = Vec::new();
    // Lowest original line touched so far; everything below is untouched.
    let mut floor: Option<usize> = None;

    for patch in ordered {
        let Some((start, end)) = normalize(patch, original_count) else {
            let reason = if patch.line_start > patch.line_end {
                SkipReason::Inverted
            } else {
                SkipReason::OutOfRange
            };
            skip(&mut outcome, patch, reason);
            continue;
        };
        if floor.is_some_and(|f| end >= f || start >= f) {
            skip(&mut outcome, patch, SkipReason::Overlap);
            continue;
        }

        let removed = if end >= start { end - start + 1 } else { 0 };
        let inserted = patch.replacement_text.split('\n').count();
        outcome.document = outcome.document.splice(start, end, &patch.replacement_text);

        // Markers from higher patches sit entirely after this one.
        for marker in markers.iter_mut() {
            *marker = *marker + inserted - removed;
        }
        markers.extend(start..start + inserted);
        floor = Some(start);
    }

    outcome.changed_lines = markers.into_iter().collect();
    debug!(
        applied = patches.len() - outcome.skipped.len(),
        skipped = outcome.skipped.len(),
        "Applied patch set"
    );
    outcome
}

/// Clamp a patch to `line_count`, or `None` when it must be skipped.
///
/// Returns `(start, end)` where `end < start` means "insert before start"
/// (only produced for appends at `line_count + 1`).
fn normalize(patch: &Patch, line_count: usize) -> Option<(usize, usize)> {
    if patch.line_start > patch.line_end {
        return None;
    }
    let start = patch.line_start.max(1);
    if start > line_count + 1 {
        return None;
    }
    if start == line_count + 1 {
        return Some((start, line_count));
    }
    let end = patch.line_end.clamp(start, line_count);
    Some((start, end))
}

fn skip(outcome: &mut PatchOutcome, patch: &Patch, reason: SkipReason) {
    warn!(
        line_start = patch.line_start,
        line_end = patch.line_end,
        ?reason,
        "Skipping malformed patch"
    );
    outcome.skipped.push(SkippedPatch {
        patch: patch.clone(),
        reason,
    });
}

/// Apply `spec` to raw text and return the new text.
pub fn apply_to_text(text: &str, spec: &PatchSpec) -> String {
    apply(&SourceDocument::new(text), spec).document.text()
}
