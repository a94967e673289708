//! Engine facade.
//!
//! Wires the tier chain, scanner, merge, patch applier, mistake tracker and
//! run history behind the caller-facing operations:
//!
//! | Operation          | Result                                   |
//! |--------------------|------------------------------------------|
//! | `run_source`       | [`RunOutcome`]: result + merged findings |
//! | `scan_source`      | scanner diagnostics only                 |
//! | `apply_patch`      | patched text                             |
//! | `suggest_fix`      | [`FixSuggestion`] (model, then local)    |
//! | `translate_source` | program text in the target language      |

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::diagnostic::Diagnostic;
use crate::error::{EngineError, EngineResult};
use crate::execution::{
    AiSimulatedTier, CompilationResult, DegradationLevel, ExecutionTier, LocalSimulationTier,
    RemoteSandboxTier, RunRequest, SandboxService, TierChain,
};
use crate::fixer::{AiFixer, FixSuggestion, LocalFixer};
use crate::gateway::ModelGateway;
use crate::history::{RunHistory, RunRecord};
use crate::merge::merge;
use crate::mistakes::MistakeTracker;
use crate::patch::{self, PatchSpec};
use crate::scanner::Scanner;
use crate::source::SourceDocument;
use crate::storage::SharedStore;
use crate::translate::Translator;

/// Everything the caller gets back from one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub result: CompilationResult,
    /// `None` when the source is in a foreign language: no analysis applies.
    pub diagnostics: Option<Vec<Diagnostic>>,
    pub level: DegradationLevel,
    pub served_by: String,
    pub warnings: Vec<String>,
}

impl RunOutcome {
    pub fn is_foreign_language(&self) -> bool {
        self.result.is_foreign_language()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_deref().unwrap_or(&[])
    }
}

/// Builder for [`DiagnosticEngine`]. Tiers are added in fidelity order:
/// sandbox (if any), simulation (if a gateway is set), local interpreter.
pub struct EngineBuilder {
    config: EngineConfig,
    store: SharedStore,
    sandbox: Option<Box<dyn ExecutionTier>>,
    gateway: Option<Arc<dyn ModelGateway>>,
}

impl EngineBuilder {
    pub fn sandbox<S: SandboxService + 'static>(mut self, service: S) -> Self {
        let tier = RemoteSandboxTier::new(service).with_timeout(self.config.sandbox_timeout());
        self.sandbox = Some(Box::new(tier));
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn build(self) -> DiagnosticEngine {
        let config = self.config;
        let mut chain = TierChain::new();
        if let Some(sandbox) = self.sandbox {
            chain = chain.add_boxed(sandbox);
        }
        if let Some(gateway) = &self.gateway {
            chain = chain.add_tier(
                AiSimulatedTier::new(gateway.clone()).with_temperature(config.simulation_temperature),
            );
        }
        chain = chain.add_tier(LocalSimulationTier::new());
        info!(tiers = ?chain.tier_names(), language = %config.language, "Engine ready");

        DiagnosticEngine {
            scanner: Scanner::new(),
            mistakes: MistakeTracker::new(self.store.clone()),
            history: RunHistory::with_capacity(self.store, config.history_capacity),
            gateway: self.gateway,
            chain,
            config,
            current: Mutex::new(CancellationToken::new()),
        }
    }
}

pub struct DiagnosticEngine {
    config: EngineConfig,
    chain: TierChain,
    scanner: Scanner,
    gateway: Option<Arc<dyn ModelGateway>>,
    mistakes: MistakeTracker<SharedStore>,
    history: RunHistory<SharedStore>,
    current: Mutex<CancellationToken>,
}

impl DiagnosticEngine {
    pub fn builder(config: EngineConfig, store: SharedStore) -> EngineBuilder {
        EngineBuilder {
            config,
            store,
            sandbox: None,
            gateway: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mistakes(&self) -> &MistakeTracker<SharedStore> {
        &self.mistakes
    }

    pub fn history(&self) -> &RunHistory<SharedStore> {
        &self.history
    }

    /// Start a new run, cancelling whichever run was in flight.
    fn begin_run(&self) -> CancellationToken {
        let token = CancellationToken::new();
        match self.current.lock() {
            Ok(mut current) => {
                current.cancel();
                *current = token.clone();
            }
            Err(poisoned) => {
                let mut current = poisoned.into_inner();
                current.cancel();
                *current = token.clone();
            }
        }
        token
    }

    /// Run `text` through the tier chain and merge diagnostics.
    pub async fn run_source(&self, text: &str, stdin: Vec<String>) -> RunOutcome {
        let cancel = self.begin_run();
        let request = RunRequest::new(text)
            .with_stdin(stdin)
            .with_language(self.config.language);

        let tiered = self.chain.execute(&request, &cancel).await;
        let scanned = self.scanner.scan(&SourceDocument::new(text));
        let diagnostics = merge(&tiered.result, scanned);

        if cancel.is_cancelled() {
            info!("Run superseded; skipping side effects");
        } else {
            self.record_side_effects(text, &tiered.result, &tiered.served_by);
        }

        RunOutcome {
            result: tiered.result,
            diagnostics,
            level: tiered.level,
            served_by: tiered.served_by,
            warnings: tiered.warnings,
        }
    }

    fn record_side_effects(&self, text: &str, result: &CompilationResult, served_by: &str) {
        if !result.is_foreign_language() {
            self.mistakes.observe(result.output_text());
        }
        let record = RunRecord::new(text, result.classification(), result.output_text())
            .served_by(served_by);
        if let Err(e) = self.history.record(record) {
            warn!("Failed to record run history: {}", e);
        }
    }

    pub fn scan_source(&self, text: &str) -> Vec<Diagnostic> {
        self.scanner.scan(&SourceDocument::new(text))
    }

    pub fn apply_patch(&self, text: &str, spec: &PatchSpec) -> String {
        patch::apply_to_text(text, spec)
    }

    /// Suggest a fix for a completed run of `text`: the model first, then
    /// the local fixer. Refused for foreign-language runs.
    pub async fn suggest_fix(&self, text: &str, outcome: &RunOutcome) -> EngineResult<FixSuggestion> {
        if outcome.is_foreign_language() {
            let lang = outcome.result.detected_language().unwrap_or("another language");
            return Err(EngineError::ForeignLanguage(lang.to_string()));
        }

        let doc = SourceDocument::new(text);
        if let Some(gateway) = &self.gateway {
            let fixer = AiFixer::new(gateway.clone()).with_temperature(self.config.fix_temperature);
            match fixer
                .suggest(&doc, self.config.language, outcome.diagnostics(), outcome.result.output_text())
                .await
            {
                Ok(fix) => return Ok(fix),
                Err(e) => warn!(kind = %e.kind(), "Model fixer failed, trying local fixer: {}", e),
            }
        }
        LocalFixer::new()
            .suggest(&doc, outcome.diagnostics())
            .ok_or(EngineError::NoFixAvailable)
    }

    /// Translate `text` from `from` into the target language.
    pub async fn translate_source(&self, text: &str, from: &str) -> EngineResult<String> {
        let gateway = self.gateway.clone().ok_or(EngineError::GatewayUnavailable)?;
        Ok(Translator::new(gateway)
            .translate(text, from, self.config.language)
            .await?)
    }
}
