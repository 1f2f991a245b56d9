// crates/core/src/llm/scripted.rs
//! Scripted provider: canned responses keyed by prompt substring.
//!
//! Used by executor and orchestrator tests so no model is required.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};

enum Script {
    /// Responses matched by a substring of the prompt.
    Keyed(Vec<(String, String)>),
    /// Responses returned in order, one per call.
    Sequence(Mutex<VecDeque<Result<String, LlmError>>>),
}

pub struct ScriptedProvider {
    script: Script,
}

impl ScriptedProvider {
    /// Respond with `response` whenever the prompt contains `needle`.
    /// Unmatched prompts get an empty response.
    pub fn keyed(pairs: Vec<(&str, &str)>) -> Self {
        Self {
            script: Script::Keyed(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }

    /// Return the given results in order, then fail as exhausted.
    pub fn sequence(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Script::Sequence(Mutex::new(results.into())),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match &self.script {
            Script::Keyed(pairs) => {
                let text = pairs
                    .iter()
                    .find(|(needle, _)| request.prompt.contains(needle))
                    .map(|(_, response)| response.clone())
                    .unwrap_or_default();
                Ok(CompletionResponse { text })
            }
            Script::Sequence(queue) => {
                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                match next {
                    Some(Ok(text)) => Ok(CompletionResponse { text }),
                    Some(Err(e)) => Err(e),
                    None => Err(LlmError::NotAvailable("script exhausted".to_string())),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyed_matching() {
        let provider = ScriptedProvider::keyed(vec![("summary", "a fine day of work")]);
        let response = provider
            .complete(CompletionRequest::new("please write the summary section"))
            .await
            .unwrap();
        assert_eq!(response.text, "a fine day of work");

        let response = provider
            .complete(CompletionRequest::new("unrelated"))
            .await
            .unwrap();
        assert!(response.text.is_empty());
    }

    #[tokio::test]
    async fn test_sequence_and_exhaustion() {
        let provider = ScriptedProvider::sequence(vec![
            Ok("first".to_string()),
            Err(LlmError::Timeout(1)),
        ]);
        assert_eq!(
            provider
                .complete(CompletionRequest::new("x"))
                .await
                .unwrap()
                .text,
            "first"
        );
        assert!(matches!(
            provider.complete(CompletionRequest::new("x")).await,
            Err(LlmError::Timeout(1))
        ));
        assert!(matches!(
            provider.complete(CompletionRequest::new("x")).await,
            Err(LlmError::NotAvailable(_))
        ));
    }
}
