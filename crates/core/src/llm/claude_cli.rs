// crates/core/src/llm/claude_cli.rs
//! Claude CLI provider — spawns `claude -p` and captures its output.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};

/// LM provider that uses the Claude CLI binary.
///
/// Spawns `claude -p --output-format text --model {model} "{prompt}"`.
pub struct ClaudeCliProvider {
    model: String,
    timeout_secs: u64,
}

impl ClaudeCliProvider {
    /// Create a provider for the given model name ("haiku", "sonnet",
    /// "opus").
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            timeout_secs: 30,
        }
    }

    /// Set the timeout in seconds for CLI invocations.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl LlmProvider for ClaudeCliProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let t0 = std::time::Instant::now();

        let mut cmd = Command::new("claude");
        cmd.args([
            "-p",
            "--output-format",
            "text",
            "--model",
            &self.model,
            &request.prompt,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
        // Strip nested-session markers so the CLI doesn't refuse to run
        // from inside an existing session.
        for var in ["CLAUDECODE", "CLAUDE_CODE_SSE_PORT", "CLAUDE_CODE_ENTRYPOINT"] {
            cmd.env_remove(var);
        }

        let output = timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout_secs))?
            .map_err(|e| LlmError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(LlmError::CliError(format!(
                "exit {:?}: {stderr}",
                output.status.code()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!(
            model = %self.model,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            response_bytes = text.len(),
            "claude CLI completion finished"
        );

        Ok(CompletionResponse { text })
    }

    fn name(&self) -> &str {
        "claude-cli"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
