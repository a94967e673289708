//! Execution tier chain
//!
//! Running learner code degrades through three strategies:
//!
//! ```text
//! RunRequest
//!   ├─ RemoteSandboxTier   real compiler + JVM, 5 s wall clock
//!   ├─ AiSimulatedTier     model emulates compiler + runtime, detects foreign languages
//!   └─ LocalSimulationTier tiny interpreter, never fails, always `degraded`
//! ```
//!
//! A tier only hands over to the next one on a recoverable [`TierError`]. A
//! definitive compile or runtime error is an ordinary [`CompilationResult`]
//! with classification `error` and ends the chain.

pub mod chain;
pub mod errors;
pub mod language;
pub mod local;
pub mod sandbox;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::diagnostic::Diagnostic;

pub use chain::{DegradationLevel, TierChain, TierOutcome};
pub use errors::{FailureKind, TierError};
pub use local::LocalSimulationTier;
pub use sandbox::{RemoteSandboxTier, SandboxRequest, SandboxResponse, SandboxService, StageOutput};
pub use simulated::AiSimulatedTier;

/// Language the learner is expected to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Java,
    C,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::C => "c",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Java => "Java",
            Self::C => "C",
        }
    }

    /// Runtime version requested from the sandbox.
    pub fn sandbox_version(&self) -> &'static str {
        match self {
            Self::Java => "15.0.2",
            Self::C => "10.2.0",
        }
    }

    /// File name the source is submitted under.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Java => "Main.java",
            Self::C => "main.c",
        }
    }

    /// Whether a free-form language name (as a model reports it) is this one.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim().to_ascii_lowercase();
        match self {
            Self::Java => name == "java",
            Self::C => name == "c" || name == "c99" || name == "c11",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(Self::Java),
            "c" => Ok(Self::C),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One request to run learner code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub source: String,
    /// Lines fed to standard input, in order.
    #[serde(default)]
    pub stdin: Vec<String>,
    #[serde(default)]
    pub language: Language,
}

impl RunRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            stdin: Vec::new(),
            language: Language::Java,
        }
    }

    pub fn with_stdin(mut self, stdin: Vec<String>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Standard input as a single newline-joined string.
    pub fn stdin_text(&self) -> String {
        self.stdin.join("\n")
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Success,
    /// Definitive compile or runtime failure.
    Error,
    /// Source is not in the target language; no further analysis applies.
    ForeignLanguage,
    /// Produced by a low-fidelity fallback.
    Degraded,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::ForeignLanguage => write!(f, "foreign_language"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Outcome of a run, built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationResult {
    output_text: String,
    exit_code: i32,
    classification: Classification,
    #[serde(default)]
    diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detected_language: Option<String>,
}

impl CompilationResult {
    pub fn success(output_text: impl Into<String>) -> Self {
        Self::build(output_text, 0, Classification::Success)
    }

    pub fn error(output_text: impl Into<String>, exit_code: i32) -> Self {
        Self::build(output_text, exit_code, Classification::Error)
    }

    pub fn degraded(output_text: impl Into<String>) -> Self {
        Self::build(output_text, 0, Classification::Degraded)
    }

    pub fn foreign_language(language: impl Into<String>, expected: Language) -> Self {
        let language = language.into();
        let message = format!(
            "This looks like {language}, not {expected}. Translate it to {expected} before running."
        );
        Self {
            detected_language: Some(language),
            ..Self::build(message, 0, Classification::ForeignLanguage)
        }
    }

    fn build(output_text: impl Into<String>, exit_code: i32, classification: Classification) -> Self {
        Self {
            output_text: output_text.into(),
            exit_code,
            classification,
            diagnostics: Vec::new(),
            detected_language: None,
        }
    }

    /// Attach structured diagnostics reported by the producing tier.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn output_text(&self) -> &str {
        &self.output_text
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn detected_language(&self) -> Option<&str> {
        self.detected_language.as_deref()
    }

    pub fn is_foreign_language(&self) -> bool {
        self.classification == Classification::ForeignLanguage
    }

    pub fn is_error(&self) -> bool {
        self.classification == Classification::Error
    }
}

/// One strategy in the chain.
#[async_trait]
pub trait ExecutionTier: Send + Sync {
    /// Identifier used in logs and warnings (e.g., "remote_sandbox").
    fn name(&self) -> &str;

    /// Confidence attached to results this tier serves (0.0–1.0).
    fn confidence(&self) -> f64 {
        1.0
    }

    /// Try to run the request. `Err` with a recoverable error hands over to
    /// the next tier; `Ok` ends the chain whatever the classification.
    async fn attempt(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<CompilationResult, TierError>;
}
