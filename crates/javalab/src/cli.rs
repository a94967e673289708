//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use javalab_engine::Language;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file (overridden by JAVALAB_* environment variables)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Target language (java or c); overrides the configured one
    #[arg(long, global = true)]
    pub language: Option<Language>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a program through the execution tiers and print merged diagnostics
    Run(RunArgs),
    /// Scan a program for known bug patterns without running it
    Scan(ScanArgs),
    /// Run a program, then suggest (and optionally apply) a fix
    Fix(FixArgs),
    /// Apply a JSON patch spec to a program
    Patch(PatchArgs),
    /// Translate a program from another language into the target language
    Translate(TranslateArgs),
    /// Show or reset the mistake histogram
    Mistakes(MistakesArgs),
    /// Show or clear recent runs
    History(HistoryArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    pub file: PathBuf,

    /// One line of standard input; repeat for more lines
    #[arg(long = "stdin", value_name = "LINE")]
    pub stdin: Vec<String>,

    /// Print the full outcome as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    pub file: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FixArgs {
    pub file: PathBuf,

    #[arg(long = "stdin", value_name = "LINE")]
    pub stdin: Vec<String>,

    /// Write the fixed program back to FILE
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    pub file: PathBuf,

    /// JSON file holding `correctedCode`, `patches` or `patch`
    pub patch: PathBuf,

    /// Write the result back to FILE instead of printing it
    #[arg(long, default_value_t = false)]
    pub write: bool,
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    pub file: PathBuf,

    /// Language the program is written in (e.g. Python)
    #[arg(long)]
    pub from: String,

    /// Write the translation here instead of printing it
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MistakesArgs {
    /// Forget one mistake symbol
    #[arg(long, value_name = "SYMBOL", conflicts_with = "reset_all")]
    pub reset: Option<String>,

    /// Forget every recorded mistake
    #[arg(long, default_value_t = false)]
    pub reset_all: bool,

    /// Number of entries to show
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = false, conflicts_with = "show")]
    pub clear: bool,

    /// Print one run in full
    #[arg(long, value_name = "ID")]
    pub show: Option<Uuid>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}
