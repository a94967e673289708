//! Remote sandbox tier.
//!
//! Submits the source to a Piston-compatible code execution service and
//! reports its stdout/stderr and exit code verbatim. The transport lives
//! behind [`SandboxService`] so the binary crate can plug in an HTTP client
//! and tests can plug in a mock.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CompilationResult, ExecutionTier, RunRequest, TierError};

/// Default wall-clock bound for one sandbox submission.
pub const DEFAULT_SANDBOX_TIMEOUT: Duration = Duration::from_secs(5);

/// One file submitted to the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxFile {
    pub name: String,
    pub content: String,
}

/// Body of a sandbox execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<SandboxFile>,
    #[serde(default)]
    pub stdin: String,
}

impl SandboxRequest {
    pub fn from_run(request: &RunRequest) -> Self {
        Self {
            language: request.language.name().to_string(),
            version: request.language.sandbox_version().to_string(),
            files: vec![SandboxFile {
                name: request.language.file_name().to_string(),
                content: request.source.clone(),
            }],
            stdin: request.stdin_text(),
        }
    }
}

/// Output of one sandbox stage (compile or run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}

impl StageOutput {
    /// Combined text, preferring the interleaved `output` field.
    pub fn text(&self) -> String {
        if !self.output.is_empty() {
            return self.output.clone();
        }
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            _ => self.stderr.clone(),
        }
    }

    fn failed(&self) -> bool {
        self.signal.is_some() || self.code.is_some_and(|c| c != 0)
    }
}

/// Body of a sandbox execution response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxResponse {
    #[serde(default)]
    pub compile: Option<StageOutput>,
    pub run: StageOutput,
}

impl SandboxResponse {
    /// Map the raw response onto a result. Only compile-vs-run failure is
    /// distinguished; the text is passed through untouched.
    pub fn into_result(self) -> CompilationResult {
        if let Some(compile) = self.compile.as_ref().filter(|c| c.failed()) {
            return CompilationResult::error(compile.text(), compile.code.unwrap_or(1));
        }
        if self.run.failed() {
            let code = self.run.code.filter(|c| *c != 0).unwrap_or(1);
            return CompilationResult::error(self.run.text(), code);
        }
        CompilationResult::success(self.run.text())
    }
}

/// Transport to a code execution service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SandboxService: Send + Sync {
    async fn execute(&self, request: SandboxRequest) -> Result<SandboxResponse, TierError>;
}

/// First tier: real compiler and runtime.
pub struct RemoteSandboxTier<S> {
    service: S,
    timeout: Duration,
}

impl<S: SandboxService> RemoteSandboxTier<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            timeout: DEFAULT_SANDBOX_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<S: SandboxService> ExecutionTier for RemoteSandboxTier<S> {
    fn name(&self) -> &str {
        "remote_sandbox"
    }

    async fn attempt(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<CompilationResult, TierError> {
        let body = SandboxRequest::from_run(request);
        debug!(language = %body.language, version = %body.version, "Submitting to sandbox");

        // Dropping the losing branch drops the in-flight request future.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TierError::Cancelled("sandbox request superseded".into()));
            }
            res = tokio::time::timeout(self.timeout, self.service.execute(body)) => res,
        };

        match response {
            Ok(Ok(resp)) => Ok(resp.into_result()),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Sandbox timed out");
                Err(TierError::timeout(self.timeout))
            }
        }
    }
}
