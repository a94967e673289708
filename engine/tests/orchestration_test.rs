//! End-to-end orchestration tests over the engine facade with scripted
//! sandbox and model doubles.
//!
//! Covers:
//! - Full fallback: sandbox timeout → malformed simulation → local interpreter
//! - Definitive compile errors end the chain and feed merge + mistakes
//! - Foreign-language results block merge and fix suggestions
//! - A new run cancels the one in flight
//! - State persists across engines sharing a file store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use javalab_engine::execution::chain::CANCELLED_MESSAGE;
use javalab_engine::execution::sandbox::{SandboxRequest, SandboxResponse, StageOutput};
use javalab_engine::{
    ChatRequest, Classification, DegradationLevel, DiagnosticEngine, EngineConfig, EngineError,
    ErrorCategory, FileStore, MemoryStore, ModelGateway, Patch, PatchSpec, SandboxService,
    TierError,
};

/// Model double answering every request with the same closure.
struct FnGateway<F> {
    reply: F,
    calls: Arc<AtomicUsize>,
}

impl<F> FnGateway<F>
where
    F: Fn(&ChatRequest) -> Result<String, TierError> + Send + Sync + 'static,
{
    fn new(reply: F) -> (Arc<dyn ModelGateway>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = Self {
            reply,
            calls: calls.clone(),
        };
        (Arc::new(gateway), calls)
    }
}

#[async_trait]
impl<F> ModelGateway for FnGateway<F>
where
    F: Fn(&ChatRequest) -> Result<String, TierError> + Send + Sync,
{
    async fn complete(&self, request: ChatRequest) -> Result<String, TierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(&request)
    }
}

/// Sandbox that never answers.
struct HangingSandbox;

#[async_trait]
impl SandboxService for HangingSandbox {
    async fn execute(&self, _request: SandboxRequest) -> Result<SandboxResponse, TierError> {
        std::future::pending().await
    }
}

/// Sandbox that reports a javac compile failure.
struct CompileErrorSandbox;

#[async_trait]
impl SandboxService for CompileErrorSandbox {
    async fn execute(&self, _request: SandboxRequest) -> Result<SandboxResponse, TierError> {
        Ok(SandboxResponse {
            compile: Some(StageOutput {
                stderr: "Main.java:2: error: ';' expected\n    int x = 5\n             ^\n1 error".into(),
                code: Some(1),
                ..Default::default()
            }),
            run: StageOutput::default(),
        })
    }
}

/// Sandbox that hangs on sources containing "slow" and echoes otherwise.
struct GatedSandbox {
    started: Arc<Notify>,
}

#[async_trait]
impl SandboxService for GatedSandbox {
    async fn execute(&self, request: SandboxRequest) -> Result<SandboxResponse, TierError> {
        if request.files[0].content.contains("slow") {
            self.started.notify_one();
            std::future::pending::<()>().await;
        }
        Ok(SandboxResponse {
            compile: None,
            run: StageOutput {
                stdout: "fast\n".into(),
                code: Some(0),
                ..Default::default()
            },
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_fallback_reaches_local_interpreter() {
    let (gateway, calls) = FnGateway::new(|_| Ok("I think this prints 3".to_string()));
    let engine = DiagnosticEngine::builder(EngineConfig::default(), MemoryStore::new().shared())
        .sandbox(HangingSandbox)
        .gateway(gateway)
        .build();

    let outcome = engine
        .run_source("int a = 1;\nint b = 2;\nSystem.out.println(a + b);", vec![])
        .await;

    assert_eq!(outcome.result.classification(), Classification::Degraded);
    assert_eq!(outcome.result.output_text(), "3\n");
    assert_eq!(outcome.served_by, "local_simulation");
    assert_eq!(outcome.level, DegradationLevel::Partial);
    assert!(outcome.warnings[0].contains("possible infinite loop"));
    assert!(outcome.warnings[1].contains("malformed"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_compile_error_is_terminal_and_merged() {
    let (gateway, calls) = FnGateway::new(|_| Ok("{}".to_string()));
    let store = MemoryStore::new().shared();
    let engine = DiagnosticEngine::builder(EngineConfig::default(), store)
        .sandbox(CompileErrorSandbox)
        .gateway(gateway)
        .build();

    let outcome = engine.run_source("int y = 4 / 0;\nint x = 5", vec![]).await;

    assert!(outcome.result.is_error());
    assert_eq!(outcome.served_by, "remote_sandbox");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let diags = outcome.diagnostics();
    assert!(diags
        .iter()
        .any(|d| d.line == 1 && d.category == ErrorCategory::DivisionByZero));
    assert!(diags.iter().any(|d| d.line == 2 && d.rule.is_empty()));

    assert_eq!(engine.mistakes().counts()["semicolon_expected"].count, 1);
    let history = engine.history().list();
    assert_eq!(history[0].status, Classification::Error);
    assert!(history[0].compiler_error.is_some());
    assert_eq!(history[0].stdout, None);
}

#[tokio::test]
async fn test_foreign_language_blocks_merge_and_fix() {
    let (gateway, _) = FnGateway::new(|req| {
        if req.json_mode {
            Ok(r#"{"languageDetected":"Python","status":"error","output":"","exitCode":1}"#.into())
        } else {
            Ok("public class Main {}".into())
        }
    });
    let engine = DiagnosticEngine::builder(EngineConfig::default(), MemoryStore::new().shared())
        .gateway(gateway)
        .build();

    let source = "x = 5 / 0\ny = x + 1";
    let outcome = engine.run_source(source, vec![]).await;

    assert!(outcome.is_foreign_language());
    assert!(outcome.diagnostics.is_none());
    assert_eq!(outcome.result.detected_language(), Some("Python"));
    assert!(engine.mistakes().counts().is_empty());

    let err = engine.suggest_fix(source, &outcome).await.unwrap_err();
    assert!(matches!(err, EngineError::ForeignLanguage(lang) if lang == "Python"));

    let translated = engine.translate_source(source, "Python").await.unwrap();
    assert_eq!(translated, "public class Main {}");
}

#[tokio::test]
async fn test_new_run_cancels_previous() {
    let started = Arc::new(Notify::new());
    let engine = Arc::new(
        DiagnosticEngine::builder(EngineConfig::default(), MemoryStore::new().shared())
            .sandbox(GatedSandbox {
                started: started.clone(),
            })
            .build(),
    );

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_source("// slow\nint x = 1;", vec![]).await })
    };
    started.notified().await;

    let second = engine.run_source("int y = 2;", vec![]).await;
    let first = first.await.unwrap();

    assert_eq!(second.result.output_text(), "fast\n");
    assert_eq!(first.result.classification(), Classification::Degraded);
    assert_eq!(first.result.output_text(), CANCELLED_MESSAGE);
    assert_eq!(first.level, DegradationLevel::Unavailable);

    let history = engine.history().list();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source_text, "int y = 2;");
}

#[tokio::test]
async fn test_state_persists_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    for _ in 0..2 {
        let store = FileStore::open(dir.path()).unwrap().shared();
        let engine = DiagnosticEngine::builder(EngineConfig::default(), store)
            .sandbox(CompileErrorSandbox)
            .build();
        engine.run_source("int x = 5", vec![]).await;
    }

    let store = FileStore::open(dir.path()).unwrap().shared();
    let engine = DiagnosticEngine::builder(EngineConfig::default(), store).build();
    assert_eq!(engine.mistakes().counts()["semicolon_expected"].count, 2);
    assert_eq!(engine.history().list().len(), 2);
}

#[test]
fn test_patch_scenario_through_facade() {
    let engine = DiagnosticEngine::builder(EngineConfig::default(), MemoryStore::new().shared()).build();
    let spec = PatchSpec::many(vec![Patch::line(1, "a"), Patch::new(3, 4, "b\nc")]);
    let text = engine.apply_patch("1\n2\n3\n4\n5", &spec);
    assert_eq!(text, "a\n2\nb\nc\n5");

    let full = PatchSpec {
        corrected_code: Some("whole".into()),
        patches: Some(vec![Patch::line(1, "ignored")]),
        patch: None,
    };
    assert_eq!(engine.apply_patch("1\n2", &full), "whole");
}
