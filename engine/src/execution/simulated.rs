//! AI-simulated compiler tier.
//!
//! Asks a chat model to behave as compiler plus runtime and to answer with a
//! single JSON object. The reply is validated through serde structs; anything
//! that does not fit is a recoverable [`TierError::MalformedResponse`].

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::language::detect_foreign;
use super::{CompilationResult, ExecutionTier, RunRequest, TierError};
use crate::diagnostic::{Diagnostic, ErrorCategory, Severity};
use crate::gateway::{strip_code_fences, ChatMessage, ChatRequest, ModelGateway};

fn system_prompt(request: &RunRequest) -> String {
    let lang = request.language.display_name();
    format!(
        "You are a strict {lang} compiler and runtime. Compile and run the program \
exactly as a real {lang} toolchain would, reading standard input from the lines provided. \
Never fix the program. First decide which programming language the code is written in.\n\
Reply with one JSON object and nothing else:\n\
{{\"languageDetected\": string, \"status\": \"success\" | \"error\", \
\"output\": string (exact stdout, or the exact compiler/runtime error text), \
\"exitCode\": integer, \
\"diagnostics\": [{{\"line\": integer, \"message\": string, \"severity\": \"error\" | \"warning\", \
\"category\": one of {categories}}}]}}",
        categories = ErrorCategory::ALL
            .iter()
            .map(|c| format!("\"{}\"", c.key()))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn user_prompt(request: &RunRequest) -> String {
    let stdin = if request.stdin.is_empty() {
        "(none)".to_string()
    } else {
        request.stdin_text()
    };
    format!("Source:\n{}\n\nStandard input:\n{}", request.source, stdin)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulatedReply {
    #[serde(default)]
    language_detected: Option<String>,
    status: String,
    output: String,
    exit_code: Option<i32>,
    #[serde(default)]
    diagnostics: Vec<SimulatedDiagnostic>,
}

#[derive(Debug, Deserialize)]
struct SimulatedDiagnostic {
    #[serde(default)]
    line: usize,
    message: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

impl SimulatedDiagnostic {
    fn into_diagnostic(self) -> Diagnostic {
        let severity = match self.severity.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("warning") => Severity::Warning,
            _ => Severity::Error,
        };
        let category = self
            .category
            .as_deref()
            .map(ErrorCategory::from_key)
            .unwrap_or(ErrorCategory::OtherLogical);
        Diagnostic::new(self.line, self.message, severity, category)
    }
}

/// Parse a model reply into a result for `request`.
pub fn parse_reply(text: &str, request: &RunRequest) -> Result<CompilationResult, TierError> {
    let reply: SimulatedReply = serde_json::from_str(strip_code_fences(text))?;

    if let Some(lang) = reply
        .language_detected
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        if !request.language.matches_name(lang) {
            return Ok(CompilationResult::foreign_language(lang, request.language));
        }
    }

    let diagnostics: Vec<Diagnostic> = reply
        .diagnostics
        .into_iter()
        .map(SimulatedDiagnostic::into_diagnostic)
        .collect();

    let result = match reply.status.trim().to_ascii_lowercase().as_str() {
        "success" => CompilationResult::success(reply.output),
        "error" => {
            let code = reply.exit_code.filter(|c| *c != 0).unwrap_or(1);
            CompilationResult::error(reply.output, code)
        }
        other => {
            return Err(TierError::malformed(format!("unknown status '{other}'")));
        }
    };
    Ok(result.with_diagnostics(diagnostics))
}

/// Second tier: a model emulating the toolchain.
pub struct AiSimulatedTier<G> {
    gateway: G,
    temperature: f32,
}

impl<G: ModelGateway> AiSimulatedTier<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl<G: ModelGateway> ExecutionTier for AiSimulatedTier<G> {
    fn name(&self) -> &str {
        "ai_simulated"
    }

    fn confidence(&self) -> f64 {
        0.7
    }

    async fn attempt(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<CompilationResult, TierError> {
        if let Some(lang) = detect_foreign(&request.source, request.language) {
            info!(detected = lang, "Foreign language detected locally");
            return Ok(CompilationResult::foreign_language(lang, request.language));
        }

        let chat = ChatRequest::new(vec![
            ChatMessage::system(system_prompt(request)),
            ChatMessage::user(user_prompt(request)),
        ])
        .json()
        .with_temperature(self.temperature);

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TierError::Cancelled("simulation superseded".into()));
            }
            reply = self.gateway.complete(chat) => reply?,
        };
        debug!(chars = reply.len(), "Simulation reply received");
        parse_reply(&reply, request)
    }
}
