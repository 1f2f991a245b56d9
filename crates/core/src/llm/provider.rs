// crates/core/src/llm/provider.rs
//! LlmProvider trait defining the interface for LM integrations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single completion request: one assembled prompt, no conversation
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// The model's raw text response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
}

/// Errors that can occur during LM invocation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to spawn LM process: {0}")]
    SpawnFailed(String),

    #[error("LM CLI returned error: {0}")]
    CliError(String),

    #[error("LM provider not available: {0}")]
    NotAvailable(String),

    #[error("LM invocation timed out after {0} seconds")]
    Timeout(u64),
}

/// Trait for LM providers that can run journal-section completions.
///
/// Implementations include:
/// - `ClaudeCliProvider` — spawns the `claude` CLI
/// - `ScriptedProvider` — canned responses for tests
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion and return the raw text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Provider name for logging (e.g. "claude-cli", "scripted").
    fn name(&self) -> &str;

    /// Model identifier (e.g. "haiku", "sonnet").
    fn model(&self) -> &str;
}
