//! javalab engine
//!
//! Diagnostics and execution orchestration for learner Java (and C) programs:
//!
//! - **Pattern diagnostics**: a fixed catalog of bug signatures scanned over
//!   source text ([`patterns`], [`scanner`]).
//! - **Tiered execution**: remote sandbox, model-simulated compiler, local
//!   interpreter, with ordered fallback ([`execution`]).
//! - **Merge**: scanner findings plus tier and compiler-output diagnostics
//!   ([`merge`]).
//! - **Patches**: line-addressed fixes applied without shifting unapplied
//!   patches ([`patch`], [`fixer`]).
//! - **State**: mistake histogram and run history over a key-value store
//!   ([`mistakes`], [`history`], [`storage`]).
//!
//! [`engine::DiagnosticEngine`] ties these together behind the caller API.
//!
//! # Usage
//!
//! ```no_run
//! use javalab_engine::{DiagnosticEngine, EngineConfig, MemoryStore};
//!
//! # async fn demo() {
//! let engine = DiagnosticEngine::builder(EngineConfig::default(), MemoryStore::new().shared()).build();
//! let outcome = engine.run_source("int x = 1;\nSystem.out.println(x);", vec![]).await;
//! for diagnostic in outcome.diagnostics() {
//!     println!("{diagnostic}");
//! }
//! # }
//! ```

pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod execution;
pub mod fixer;
pub mod gateway;
pub mod history;
pub mod merge;
pub mod mistakes;
pub mod patch;
pub mod patterns;
pub mod scanner;
pub mod source;
pub mod storage;
pub mod translate;

pub use config::EngineConfig;
pub use diagnostic::{Diagnostic, ErrorCategory, Severity};
pub use engine::{DiagnosticEngine, RunOutcome};
pub use error::{EngineError, EngineResult};
pub use execution::{
    Classification, CompilationResult, DegradationLevel, ExecutionTier, Language, RunRequest,
    SandboxService, TierChain, TierError,
};
pub use fixer::{FixOrigin, FixSuggestion};
pub use gateway::{ChatMessage, ChatRequest, ModelGateway, Role};
pub use patch::{Patch, PatchOutcome, PatchSpec};
pub use scanner::{scan, scan_source, Scanner};
pub use source::SourceDocument;
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore, StoreError};
