use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, TokenUsage};

mod mock;
mod openai;
mod retry;

pub use mock::MockCompletionClient;
pub use openai::OpenAiCompletionClient;
pub use retry::RetryingCompletionClient;

/// One request to the external completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model:       String,
    pub messages:    Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens:  Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens:  None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A finished completion: generated text plus the usage record every
/// spending decision is based on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content:     String,
    pub usage:       TokenUsage,
    pub response_id: Option<String>,
}

/// The single interface between the spending protocol and any completion
/// provider.
///
/// # Contract
/// - Must be Send + Sync (used behind Arc<dyn CompletionClient>)
/// - Returns Ok ONLY for a finished response carrying usable token
///   counts; a response without usage data is an Err
/// - Returns Err(String) for network, auth, and malformed-response
///   failures; callers must not charge anything on Err
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, String>;
}
