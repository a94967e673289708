//! Subcommand tests over a local-only (or scripted-sandbox) engine with
//! state in a temp directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use async_trait::async_trait;
use clap::Parser;
use tempfile::TempDir;

use javalab::cli::Cli;
use javalab::{App, RunnerConfig};
use javalab_engine::execution::sandbox::{SandboxRequest, SandboxResponse, StageOutput};
use javalab_engine::{DiagnosticEngine, EngineConfig, FileStore, SandboxService, TierError};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn file(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    fn local_app(&self) -> App {
        let config = RunnerConfig {
            sandbox_url: None,
            model: None,
            state_dir: self.state_dir(),
            ..RunnerConfig::default()
        };
        App::from_config(&config).unwrap()
    }
}

async fn invoke(app: &App, args: &[&str]) -> (ExitCode, String) {
    let cli = Cli::parse_from(std::iter::once("javalab").chain(args.iter().copied()));
    let mut out = Vec::new();
    let code = app.dispatch(cli.command, &mut out).await.unwrap();
    (code, String::from_utf8(out).unwrap())
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Sandbox that always reports a missing semicolon.
struct MissingSemicolon;

#[async_trait]
impl SandboxService for MissingSemicolon {
    async fn execute(&self, _request: SandboxRequest) -> Result<SandboxResponse, TierError> {
        Ok(SandboxResponse {
            compile: Some(StageOutput {
                stderr: "Main.java:1: error: ';' expected\n1 error".into(),
                code: Some(1),
                ..Default::default()
            }),
            run: StageOutput::default(),
        })
    }
}

#[tokio::test]
async fn test_run_prints_output_and_records_history() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file("Main.java", "int x = 2;\nSystem.out.println(x * 21);\n");

    let (code, out) = invoke(&app, &["run", arg(&file)]).await;
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(out.starts_with("[degraded via local_simulation, full fidelity]"));
    assert!(out.contains("\n42\n"));

    let (_, out) = invoke(&app, &["history"]).await;
    assert!(out.contains("local_simulation"));
    assert!(out.contains("int x = 2;"));
}

#[tokio::test]
async fn test_run_json_outcome() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file("Main.java", "int y = 3 / 0;\n");

    let (_, out) = invoke(&app, &["run", arg(&file), "--json"]).await;
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["served_by"], "local_simulation");
    let diagnostics = value["diagnostics"].as_array().unwrap();
    assert!(diagnostics
        .iter()
        .any(|d| d["category"] == "division_by_zero" && d["line"] == 1));
}

#[tokio::test]
async fn test_scan_lists_findings() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let clean = ws.file("Clean.java", "int x = 1;\n");
    let buggy = ws.file("Buggy.java", "int x = 1;\nint y = x / 0;\n");

    let (_, out) = invoke(&app, &["scan", arg(&clean)]).await;
    assert_eq!(out.trim(), "No known bug patterns found.");

    let (code, out) = invoke(&app, &["scan", arg(&buggy)]).await;
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(out.contains("line 2: error [division_by_zero]"));
}

#[tokio::test]
async fn test_patch_write_updates_file() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file("five.txt", "1\n2\n3\n4\n5");
    let patch = ws.file(
        "fix.json",
        r#"{"patches":[{"lineStart":1,"lineEnd":1,"replacementText":"a"},{"lineStart":3,"lineEnd":4,"replacementText":"b\nc"}]}"#,
    );

    let (_, out) = invoke(&app, &["patch", arg(&file), arg(&patch)]).await;
    assert_eq!(out, "a\n2\nb\nc\n5\n");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "1\n2\n3\n4\n5");

    invoke(&app, &["patch", arg(&file), arg(&patch), "--write"]).await;
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "a\n2\nb\nc\n5");
}

#[tokio::test]
async fn test_fix_applies_local_repair() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file(
        "Main.java",
        "int[] a = new int[3];\nfor (int i = 0; i <= a.length; i++) {\n  a[i] = i;\n}",
    );

    let (code, out) = invoke(&app, &["fix", arg(&file), "--apply"]).await;
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(out.starts_with("Suggested fix (local rules)"));
    let fixed = std::fs::read_to_string(&file).unwrap();
    assert!(fixed.contains("i < a.length"));
}

#[tokio::test]
async fn test_fix_without_findings_reports_none() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file("Main.java", "int x = 1;\nSystem.out.println(x);");

    let (code, out) = invoke(&app, &["fix", arg(&file)]).await;
    assert_eq!(code, ExitCode::FAILURE);
    assert_eq!(out.trim(), "No fix available for this program.");
}

#[tokio::test]
async fn test_translate_without_model_fails() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file("prog.py", "print(1)");
    let cli = Cli::parse_from(["javalab", "translate", arg(&file), "--from", "Python"]);

    let mut out = Vec::new();
    let err = app.dispatch(cli.command, &mut out).await.unwrap_err();
    assert!(format!("{err:#}").contains("no model gateway"), "got {err:#}");
}

#[tokio::test]
async fn test_mistakes_listing_and_reset() {
    let ws = Workspace::new();
    let store = FileStore::open(ws.state_dir()).unwrap().shared();
    let engine = DiagnosticEngine::builder(EngineConfig::default(), store)
        .sandbox(MissingSemicolon)
        .build();
    let app = App::with_engine(engine);
    let file = ws.file("Main.java", "int x = 5");

    let (code, _) = invoke(&app, &["run", arg(&file)]).await;
    assert_eq!(code, ExitCode::FAILURE);
    invoke(&app, &["run", arg(&file)]).await;

    let (_, out) = invoke(&app, &["mistakes"]).await;
    assert!(out.contains("2  Missing semicolon (semicolon_expected)"), "got {out}");

    invoke(&app, &["mistakes", "--reset", "semicolon_expected"]).await;
    let (_, out) = invoke(&app, &["mistakes"]).await;
    assert_eq!(out.trim(), "No mistakes recorded yet.");
}

#[tokio::test]
async fn test_history_show_and_clear() {
    let ws = Workspace::new();
    let app = ws.local_app();
    let file = ws.file("Main.java", "System.out.println(\"hi\");");
    invoke(&app, &["run", arg(&file)]).await;

    let id = app.engine().history().list()[0].id.to_string();
    let (code, out) = invoke(&app, &["history", "--show", &id]).await;
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(out.contains("\"stdout\": \"hi\\n\""));

    invoke(&app, &["history", "--clear"]).await;
    let (_, out) = invoke(&app, &["history"]).await;
    assert_eq!(out.trim(), "No runs recorded yet.");
}
