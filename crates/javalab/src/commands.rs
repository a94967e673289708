//! Subcommand handlers.
//!
//! Each handler writes human-readable (or JSON) output to the supplied
//! writer and returns the process exit code; tracing goes to stderr.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use javalab_engine::mistakes::label;
use javalab_engine::{
    DiagnosticEngine, EngineError, FileStore, FixOrigin, ModelGateway, PatchSpec, RunOutcome,
};
use tracing::{info, warn};

use crate::chat::ChatGateway;
use crate::cli::{
    Command, FixArgs, HistoryArgs, MistakesArgs, PatchArgs, RunArgs, ScanArgs, TranslateArgs,
};
use crate::config::RunnerConfig;
use crate::piston::PistonClient;

/// A configured engine plus the command handlers over it.
pub struct App {
    engine: DiagnosticEngine,
}

impl App {
    /// Open the state directory and wire whichever adapters are configured.
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let store = FileStore::open(&config.state_dir)
            .with_context(|| format!("Failed to open state directory {}", config.state_dir.display()))?
            .shared();
        let mut builder = DiagnosticEngine::builder(config.engine.clone(), store);

        if let Some(url) = &config.sandbox_url {
            let sandbox = PistonClient::new(url.clone(), config.http_timeout)
                .context("Failed to create sandbox client")?;
            info!(url = %sandbox.url(), "Remote sandbox enabled");
            builder = builder.sandbox(sandbox);
        }
        if let Some(endpoint) = &config.model {
            let gateway = ChatGateway::new(endpoint.clone(), config.http_timeout)
                .context("Failed to create model client")?;
            info!(model = %endpoint.model, url = %endpoint.base_url, "Model gateway enabled");
            builder = builder.gateway(Arc::new(gateway) as Arc<dyn ModelGateway>);
        }

        Ok(Self {
            engine: builder.build(),
        })
    }

    pub fn with_engine(engine: DiagnosticEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &DiagnosticEngine {
        &self.engine
    }

    pub async fn dispatch(&self, command: Command, out: &mut dyn Write) -> Result<ExitCode> {
        match command {
            Command::Run(args) => self.run(args, out).await,
            Command::Scan(args) => self.scan(args, out),
            Command::Fix(args) => self.fix(args, out).await,
            Command::Patch(args) => self.patch(args, out),
            Command::Translate(args) => self.translate(args, out).await,
            Command::Mistakes(args) => self.mistakes(args, out),
            Command::History(args) => self.history(args, out),
        }
    }

    async fn run(&self, args: RunArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let source = read_source(&args.file)?;
        let outcome = self.engine.run_source(&source, args.stdin).await;
        if args.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
        } else {
            write_outcome(&outcome, out)?;
        }
        Ok(exit_code(&outcome))
    }

    fn scan(&self, args: ScanArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let source = read_source(&args.file)?;
        let diagnostics = self.engine.scan_source(&source);
        if args.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&diagnostics)?)?;
        } else if diagnostics.is_empty() {
            writeln!(out, "No known bug patterns found.")?;
        } else {
            for diagnostic in &diagnostics {
                writeln!(out, "{diagnostic}")?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn fix(&self, args: FixArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let source = read_source(&args.file)?;
        let outcome = self.engine.run_source(&source, args.stdin).await;

        let suggestion = match self.engine.suggest_fix(&source, &outcome).await {
            Ok(suggestion) => suggestion,
            Err(EngineError::NoFixAvailable) => {
                writeln!(out, "No fix available for this program.")?;
                return Ok(ExitCode::FAILURE);
            }
            Err(EngineError::ForeignLanguage(lang)) => {
                writeln!(
                    out,
                    "This looks like {lang}; try `javalab translate --from {lang}` first."
                )?;
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e).context("Fix suggestion failed"),
        };

        let fixed = self.engine.apply_patch(&source, &suggestion.spec);
        let origin = match suggestion.origin {
            FixOrigin::Model => "model",
            FixOrigin::Local => "local rules",
        };
        writeln!(out, "Suggested fix ({origin}): {}", suggestion.explanation)?;
        if args.apply {
            write_file(&args.file, &fixed)?;
            writeln!(out, "Applied to {}", args.file.display())?;
        } else {
            writeln!(out, "{fixed}")?;
        }
        Ok(ExitCode::SUCCESS)
    }

    fn patch(&self, args: PatchArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let source = read_source(&args.file)?;
        let raw = read_source(&args.patch)?;
        let spec: PatchSpec = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid patch file {}", args.patch.display()))?;

        let patched = self.engine.apply_patch(&source, &spec);
        if args.write {
            write_file(&args.file, &patched)?;
            writeln!(out, "Patched {}", args.file.display())?;
        } else {
            writeln!(out, "{patched}")?;
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn translate(&self, args: TranslateArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let source = read_source(&args.file)?;
        let translated = self
            .engine
            .translate_source(&source, &args.from)
            .await
            .with_context(|| format!("Failed to translate {}", args.file.display()))?;
        match args.out {
            Some(path) => {
                write_file(&path, &translated)?;
                writeln!(out, "Wrote {}", path.display())?;
            }
            None => writeln!(out, "{translated}")?,
        }
        Ok(ExitCode::SUCCESS)
    }

    fn mistakes(&self, args: MistakesArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let tracker = self.engine.mistakes();
        if args.reset_all {
            tracker.reset_all().context("Failed to reset mistakes")?;
            writeln!(out, "Mistake history cleared.")?;
            return Ok(ExitCode::SUCCESS);
        }
        if let Some(symbol) = args.reset {
            if label(&symbol).is_none() {
                warn!(symbol = %symbol, "Resetting an unknown mistake symbol");
            }
            tracker
                .reset(&symbol)
                .with_context(|| format!("Failed to reset {symbol}"))?;
            writeln!(out, "Reset {symbol}.")?;
            return Ok(ExitCode::SUCCESS);
        }

        let top = tracker.top(args.top);
        if top.is_empty() {
            writeln!(out, "No mistakes recorded yet.")?;
        }
        for (symbol, count) in top {
            let name = label(&symbol).unwrap_or(symbol.as_str());
            writeln!(out, "{count:>4}  {name} ({symbol})")?;
        }
        Ok(ExitCode::SUCCESS)
    }

    fn history(&self, args: HistoryArgs, out: &mut dyn Write) -> Result<ExitCode> {
        let history = self.engine.history();
        if args.clear {
            history.clear().context("Failed to clear history")?;
            writeln!(out, "Run history cleared.")?;
            return Ok(ExitCode::SUCCESS);
        }
        if let Some(id) = args.show {
            let Some(record) = history.get(id) else {
                writeln!(out, "No run with id {id}.")?;
                return Ok(ExitCode::FAILURE);
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
            return Ok(ExitCode::SUCCESS);
        }

        let records = history.list();
        if records.is_empty() {
            writeln!(out, "No runs recorded yet.")?;
        }
        for record in records.iter().take(args.limit) {
            let first_line = record.source_text.lines().next().unwrap_or("").trim();
            writeln!(
                out,
                "{}  {}  {:<16} {:<18} {}",
                record.id,
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.status.to_string(),
                record.served_by,
                first_line
            )?;
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn write_outcome(outcome: &RunOutcome, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "[{} via {}, {} fidelity]",
        outcome.result.classification(),
        outcome.served_by,
        outcome.level
    )?;
    let text = outcome.result.output_text();
    if !text.is_empty() {
        writeln!(out, "{}", text.trim_end())?;
    }
    for warning in &outcome.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    match &outcome.diagnostics {
        None => writeln!(
            out,
            "Diagnostics skipped: program appears to be {}.",
            outcome.result.detected_language().unwrap_or("in another language")
        )?,
        Some(diagnostics) if diagnostics.is_empty() => {}
        Some(diagnostics) => {
            writeln!(out, "Diagnostics:")?;
            for diagnostic in diagnostics {
                writeln!(out, "  {diagnostic}")?;
            }
        }
    }
    Ok(())
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    if outcome.result.is_error() || outcome.is_foreign_language() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}
