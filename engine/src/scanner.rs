//! Static diagnostic scanner
//!
//! Runs every rule of a pattern catalog against a document and collects the
//! findings in catalog order. Scanning never fails: rules that cannot make
//! sense of a line simply stay silent.

use std::collections::HashSet;

use tracing::debug;

use crate::diagnostic::Diagnostic;
use crate::patterns::{Matcher, PatternRule, ScanInput, DEFAULT_RULES};
use crate::source::SourceDocument;

/// Scanner over a fixed rule catalog.
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    rules: &'static [PatternRule],
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Scanner over the default catalog.
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES,
        }
    }

    /// Scanner over a custom catalog.
    pub fn with_rules(rules: &'static [PatternRule]) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'static [PatternRule] {
        self.rules
    }

    /// Scan a document. Output is grouped by rule, in catalog order; within a
    /// rule, by line. Each rule reports a given line at most once.
    pub fn scan(&self, doc: &SourceDocument) -> Vec<Diagnostic> {
        let input = ScanInput::new(doc);
        let mut diagnostics = Vec::new();

        for rule in self.rules {
            let before = diagnostics.len();
            match rule.matcher {
                Matcher::Line(check) => {
                    for (line, code) in input.code_lines() {
                        if let Some(bindings) = check(code, input.raw(line)) {
                            diagnostics.push(build(rule, line, &bindings));
                        }
                    }
                }
                Matcher::Window(check) => {
                    for line in 1..=input.len() {
                        if let Some(bindings) = check(&input, line) {
                            diagnostics.push(build(rule, line, &bindings));
                        }
                    }
                }
                Matcher::Document(check) => {
                    let mut hits = check(&input);
                    hits.sort_by_key(|(line, _)| *line);
                    let mut seen = HashSet::new();
                    for (line, bindings) in hits {
                        if seen.insert(line) {
                            diagnostics.push(build(rule, line, &bindings));
                        }
                    }
                }
            }
            if diagnostics.len() > before {
                debug!(rule = rule.id, hits = diagnostics.len() - before, "Pattern fired");
            }
        }

        diagnostics
    }
}

fn build(rule: &PatternRule, line: usize, bindings: &crate::patterns::Bindings) -> Diagnostic {
    Diagnostic::new(line, rule.message(bindings), rule.severity, rule.category).with_rule(rule.id)
}

/// Scan with the default catalog.
pub fn scan(doc: &SourceDocument) -> Vec<Diagnostic> {
    Scanner::new().scan(doc)
}

/// Scan raw text with the default catalog.
pub fn scan_source(text: &str) -> Vec<Diagnostic> {
    scan(&SourceDocument::new(text))
}
