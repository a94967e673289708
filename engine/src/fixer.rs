//! Fix suggestions: a model-backed fixer and a deterministic local one.
//!
//! Both produce a [`FixSuggestion`] whose [`PatchSpec`] addresses lines of the
//! document the diagnostics were computed on.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostic::Diagnostic;
use crate::execution::{Language, TierError};
use crate::gateway::{strip_code_fences, ChatMessage, ChatRequest, ModelGateway};
use crate::patch::{Patch, PatchSpec};
use crate::patterns::text::mask_lines;
use crate::source::SourceDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOrigin {
    Model,
    Local,
}

/// An explanation plus the patches implementing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub explanation: String,
    pub spec: PatchSpec,
    pub origin: FixOrigin,
}

#[derive(Debug, Deserialize)]
struct FixReply {
    explanation: String,
    #[serde(flatten)]
    spec: PatchSpec,
}

fn numbered(doc: &SourceDocument) -> String {
    doc.numbered()
        .map(|(n, line)| format!("{n:>4} | {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fixer backed by a chat model in JSON mode.
pub struct AiFixer<G> {
    gateway: G,
    temperature: f32,
}

impl<G: ModelGateway> AiFixer<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn suggest(
        &self,
        doc: &SourceDocument,
        language: Language,
        diagnostics: &[Diagnostic],
        output: &str,
    ) -> Result<FixSuggestion, TierError> {
        let system = format!(
            "You are a patient {lang} tutor. Fix the learner's program with the smallest change \
that resolves the reported problems, and explain the fix in two or three sentences. \
Reply with one JSON object: {{\"explanation\": string, \"patches\": [{{\"lineStart\": integer, \
\"lineEnd\": integer, \"replacementText\": string}}]}}. Line numbers refer to the numbered \
source. Use \"correctedCode\" (the whole program) instead of patches only when the fix touches \
most of the program.",
            lang = language.display_name()
        );
        let findings = if diagnostics.is_empty() {
            "(none)".to_string()
        } else {
            diagnostics
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        };
        let user = format!(
            "Source:\n{}\n\nProgram output:\n{}\n\nFindings:\n{}",
            numbered(doc),
            output,
            findings
        );

        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .json()
            .with_temperature(self.temperature);
        let reply = self.gateway.complete(request).await?;
        parse_fix_reply(&reply)
    }
}

/// Validate a model reply into a suggestion.
pub fn parse_fix_reply(text: &str) -> Result<FixSuggestion, TierError> {
    let reply: FixReply = serde_json::from_str(strip_code_fences(text))?;
    if reply.spec.is_empty() {
        return Err(TierError::malformed("fix reply carries no patch"));
    }
    Ok(FixSuggestion {
        explanation: reply.explanation.trim().to_string(),
        spec: reply.spec,
        origin: FixOrigin::Model,
    })
}

static STRING_COMPARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<lhs>"(?:[^"\\]|\\.)*"|[A-Za-z_][\w.]*(?:\(\))?)\s*(?P<op>==|!=)\s*(?P<rhs>"(?:[^"\\]|\\.)*"|[A-Za-z_][\w.]*(?:\(\))?)"#,
    )
    .unwrap()
});

/// Deterministic fixes for findings with an obvious mechanical repair.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFixer;

impl LocalFixer {
    pub fn new() -> Self {
        Self
    }

    /// One patch per repaired line, or `None` when nothing is repairable.
    pub fn suggest(&self, doc: &SourceDocument, diagnostics: &[Diagnostic]) -> Option<FixSuggestion> {
        let masked = mask_lines(doc.lines());
        let mut fixed: BTreeMap<usize, String> = BTreeMap::new();
        let mut notes: Vec<&'static str> = Vec::new();

        for diag in diagnostics {
            let Some(original) = doc.line(diag.line) else {
                continue;
            };
            let current = fixed.get(&diag.line).cloned().unwrap_or_else(|| original.to_string());
            let code = &masked[diag.line - 1];

            let repaired = match diag.rule.as_str() {
                "length-inclusive-bound" | "array-size-inclusive-loop" => {
                    exclusive_bound(&current, code).map(|l| (l, "use `<` so the loop stops before the last index"))
                }
                "string-literal-identity" | "string-variable-identity" => {
                    equals_call(&current).map(|l| (l, "compare string contents with `.equals(...)`"))
                }
                "empty-loop-body" | "empty-if-body" => {
                    drop_stray_semicolon(&current).map(|l| (l, "remove the `;` that ends the statement early"))
                }
                _ => None,
            };

            if let Some((line, note)) = repaired {
                fixed.insert(diag.line, line);
                if !notes.contains(&note) {
                    notes.push(note);
                }
            }
        }

        if fixed.is_empty() {
            return None;
        }
        debug!(lines = fixed.len(), "Local fixer produced patches");
        let patches = fixed
            .into_iter()
            .map(|(line, text)| Patch::line(line, text))
            .collect();
        Some(FixSuggestion {
            explanation: format!("Suggested change: {}.", notes.join("; ")),
            spec: PatchSpec::many(patches),
            origin: FixOrigin::Local,
        })
    }
}

/// Replace the first `<=` that is code (not inside a literal or comment).
fn exclusive_bound(line: &str, code: &str) -> Option<String> {
    let pos = code.find("<=")?;
    if !line.get(pos..)?.starts_with("<=") {
        return None;
    }
    Some(format!("{}<{}", &line[..pos], &line[pos + 2..]))
}

fn equals_call(line: &str) -> Option<String> {
    let caps = STRING_COMPARE
        .captures_iter(line)
        .find(|c| c["lhs"] != *"null" && c["rhs"] != *"null")?;
    let whole = caps.get(0)?;
    Some(format!(
        "{}{}{}",
        &line[..whole.start()],
        render_equals(&caps),
        &line[whole.end()..]
    ))
}

fn render_equals(caps: &Captures<'_>) -> String {
    let negate = if &caps["op"] == "!=" { "!" } else { "" };
    // Literal first keeps the call null-safe.
    let (recv, arg) = if caps["rhs"].starts_with('"') {
        (&caps["rhs"], &caps["lhs"])
    } else {
        (&caps["lhs"], &caps["rhs"])
    };
    format!("{negate}{recv}.equals({arg})")
}

fn drop_stray_semicolon(line: &str) -> Option<String> {
    let trimmed = line.trim_end();
    let kept = trimmed.strip_suffix(';')?;
    Some(kept.trim_end().to_string())
}
