// crates/core/src/llm/mod.rs
//! Language-model seam: the provider trait plus implementations.
//!
//! The core never reasons about the model itself — it hands a prompt
//! to an `LlmProvider` and receives text back. The default provider
//! spawns the `claude` CLI; `ScriptedProvider` serves tests.

pub mod claude_cli;
pub mod provider;
pub mod scripted;

pub use claude_cli::ClaudeCliProvider;
pub use provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};
pub use scripted::ScriptedProvider;
