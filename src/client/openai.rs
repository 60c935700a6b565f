use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::types::TokenUsage;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat-completions client.
pub struct OpenAiCompletionClient {
    http:     reqwest::Client,
    api_base: String,
    api_key:  String,
}

impl OpenAiCompletionClient {
    /// Standard client using the OPENAI_API_KEY env var
    pub fn new() -> Result<Self, String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY is not set".to_string())?;
        Ok(Self::with_base_url(DEFAULT_API_BASE, api_key))
    }

    /// Custom base URL, for gateways, proxies, or local stacks exposing
    /// the same wire format.
    pub fn with_base_url(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http:     reqwest::Client::new(),
            api_base: api_base.into(),
            api_key:  api_key.into(),
        }
    }
}

// Wire types for the chat-completions response. Only the fields the
// spending path reads.
#[derive(Deserialize)]
struct WireResponse {
    id:      Option<String>,
    choices: Vec<WireChoice>,
    usage:   Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens:     u32,
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<WirePromptDetails>,
}

#[derive(Deserialize, Default)]
struct WirePromptDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, String> {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Completion API request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Completion API error {}: {}", status, text));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse completion response: {}", e))?;

        let usage = wire
            .usage
            .ok_or("Completion response carried no usage data")?;
        let cached = usage.prompt_tokens_details.unwrap_or_default().cached_tokens;

        let content = wire
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or("Empty completion response")?;

        Ok(CompletionResponse {
            content,
            usage: TokenUsage::with_cached(usage.prompt_tokens, usage.completion_tokens, cached),
            response_id: wire.id,
        })
    }
}
