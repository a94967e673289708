//! javalab runner
//!
//! HTTP adapters (Piston sandbox, OpenAI-compatible chat) and the CLI
//! handlers around [`javalab_engine::DiagnosticEngine`].

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod http;
pub mod piston;

pub use chat::ChatGateway;
pub use commands::App;
pub use config::{ModelEndpoint, RunnerConfig};
pub use piston::PistonClient;
