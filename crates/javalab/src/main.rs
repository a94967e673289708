use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use javalab::cli::Cli;
use javalab::{App, RunnerConfig};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = RunnerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(language) = cli.language {
        config.engine.language = language;
    }
    info!(
        language = %config.engine.language,
        state_dir = %config.state_dir.display(),
        sandbox = config.sandbox_url.is_some(),
        model = config.model.is_some(),
        "javalab starting"
    );

    let app = App::from_config(&config)?;
    let mut stdout = std::io::stdout().lock();
    let code = app.dispatch(cli.command, &mut stdout).await?;
    debug!("Command finished");
    Ok(code)
}
