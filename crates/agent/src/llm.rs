use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use innkeep_core::config::{LlmConfig, LlmProvider};

pub const SYSTEM_PROMPT: &str = "You are a concise hotel booking assistant. Use only the provided \
hotel facts. Answer in the user's language. Keep replies short. If the user asks to book, \
collect check-in, check-out, guests, and room type.";

pub const FALLBACK_REPLY: &str = "Sorry, I cannot answer that right now. Please try again.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("language model is not configured: {0}")]
    NotConfigured(String),
    #[error("language model request failed: {0}")]
    Transport(String),
    #[error("language model returned status {status}")]
    Status { status: u16 },
    #[error("language model response was not understood: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn reply(&self, user_text: &str, context: &[String]) -> Result<String, LlmError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

pub fn build_messages(user_text: &str, context: &[String]) -> Vec<ChatMessage> {
    let context = context.iter().map(|snippet| format!("- {snippet}")).collect::<Vec<_>>();
    vec![
        ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
        ChatMessage { role: "system", content: format!("Context:\n{}", context.join("\n\n")) },
        ChatMessage { role: "user", content: user_text.to_string() },
    ]
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat-completions client for OpenAI and servers speaking the same API
/// (Ollama's `/v1`).
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    provider: LlmProvider,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.resolved_base_url()),
            api_key: config.api_key.clone(),
            provider: config.provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn bearer(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| !key.trim().is_empty())
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn reply(&self, user_text: &str, context: &[String]) -> Result<String, LlmError> {
        let bearer = self.bearer();
        if bearer.is_none() && self.provider == LlmProvider::OpenAi {
            return Err(LlmError::NotConfigured("llm.api_key is not set".to_string()));
        }

        let request = CompletionRequest {
            model: &self.model,
            messages: build_messages(user_text, context),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(bearer) = bearer {
            builder = builder.bearer_auth(bearer);
        }

        let response =
            builder.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(LlmError::Status { status: response.status().as_u16() });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        parse_completion(&body)
    }
}

pub fn parse_completion(body: &Value) -> Result<String, LlmError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()))
}

/// Asks the model and degrades to [`FALLBACK_REPLY`] on any failure.
pub async fn reply_or_fallback(
    llm: &dyn LlmClient,
    user_text: &str,
    context: &[String],
    correlation_id: &str,
) -> String {
    match llm.reply(user_text, context).await {
        Ok(reply) => reply,
        Err(error) => {
            warn!(
                event_name = "llm.reply_failed",
                correlation_id,
                error = %error,
                "language model failed; sending fallback reply"
            );
            FALLBACK_REPLY.to_string()
        }
    }
}
