//! Extraction oracle boundary: a pluggable [`LlmClient`] trait, the
//! Groq-backed production client, and helpers for digging JSON out of model
//! replies that ignore the "JSON only" instruction.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldrep_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm request timed out after {0}s")]
    Timeout(u64),
    #[error("llm api returned status {0}")]
    Status(u16),
    #[error("llm returned an empty completion")]
    EmptyCompletion,
    #[error("llm completion contained no parseable JSON object")]
    MalformedJson,
    #[error("llm api key is not configured")]
    MissingApiKey,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Production client for the Groq OpenAI-compatible chat completions API.
/// One fallback attempt against the backup model when the primary call
/// fails; retries beyond that belong to the caller resubmitting the turn.
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    backup_model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl GroqClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            backup_model: config.backup_model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    async fn request(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let body = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            // Low temperature: extraction wants determinism, not creativity.
            temperature: 0.1,
            max_tokens: 1024,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self.request(&self.model, prompt).await {
            Ok(reply) => Ok(reply),
            Err(primary_error) => {
                tracing::warn!(
                    event_name = "agent.llm.primary_failed",
                    model = %self.model,
                    backup_model = %self.backup_model,
                    error = %primary_error,
                    "primary model failed, retrying once with backup model"
                );
                self.request(&self.backup_model, prompt).await
            }
        }
    }
}

/// Stands in when no API key is configured. Every call fails with a
/// recoverable error so the server can still boot and serve non-chat routes.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::MissingApiKey)
    }
}

/// Test double: hands out canned completions in order, then errors.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { replies: Mutex::new(replies.into_iter().map(Into::into).collect()) }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        let mut replies = self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        replies.pop_front().ok_or(LlmError::EmptyCompletion)
    }
}

/// Digs a JSON object out of a model reply. Tries the raw text first, then
/// fenced code blocks, then the outermost brace pair. Models routinely wrap
/// "JSON only" output in markdown; this salvage path keeps those replies
/// usable.
pub fn extract_json(reply: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body[..end].trim()) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(LlmError::MalformedJson)
}

#[cfg(test)]
mod tests {
    use super::{extract_json, LlmClient, LlmError, ScriptedLlm};

    #[test]
    fn parses_bare_json_object() {
        let value = extract_json(r#"{"hcp_name": "Dr. Smith"}"#).expect("parse");
        assert_eq!(value["hcp_name"], "Dr. Smith");
    }

    #[test]
    fn parses_json_inside_marked_fence() {
        let reply = "Here you go:\n```json\n{\"sentiment\": \"Positive\"}\n```\nanything else?";
        let value = extract_json(reply).expect("parse");
        assert_eq!(value["sentiment"], "Positive");
    }

    #[test]
    fn parses_json_inside_anonymous_fence() {
        let reply = "```\n{\"date\": \"2026-08-25\"}\n```";
        let value = extract_json(reply).expect("parse");
        assert_eq!(value["date"], "2026-08-25");
    }

    #[test]
    fn salvages_json_from_surrounding_prose() {
        let reply = "Sure! The extraction is {\"products_discussed\": [\"Product X\"]} as requested.";
        let value = extract_json(reply).expect("parse");
        assert_eq!(value["products_discussed"][0], "Product X");
    }

    #[test]
    fn rejects_reply_without_object() {
        assert!(matches!(extract_json("no json here"), Err(LlmError::MalformedJson)));
        assert!(matches!(extract_json("[1, 2, 3]"), Err(LlmError::MalformedJson)));
    }

    #[tokio::test]
    async fn scripted_llm_pops_in_order_then_errors() {
        let llm = ScriptedLlm::new(["first", "second"]);
        assert_eq!(llm.complete("p").await.expect("first"), "first");
        assert_eq!(llm.complete("p").await.expect("second"), "second");
        assert!(matches!(llm.complete("p").await, Err(LlmError::EmptyCompletion)));
    }
}
