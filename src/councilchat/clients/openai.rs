//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat
//! Completions API and any endpoint compatible with it (Ollama, vLLM,
//! LM Studio, Azure style proxies).
//!
//! # Key Features
//!
//! - **JSON mode**: [`ResponseFormat::JsonObject`] is sent as
//!   `response_format: {"type": "json_object"}`, which selection calls rely on.
//! - **Automatic Usage Capture**: stores the latest `TokenUsage` internally;
//!   read it with `get_last_usage()` after `send_message()`.
//!
//! # Example
//!
//! ```rust,no_run
//! use councilchat::clients::openai::OpenAIClient;
//! use councilchat::client_wrapper::{ClientWrapper, Message, ResponseFormat, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new(&key, "gpt-4o-mini");
//!
//!     let reply = client
//!         .send_message(
//!             &[
//!                 Message::new(Role::System, "You are an assistant."),
//!                 Message::new(Role::User, "Hello!"),
//!             ],
//!             ResponseFormat::Text,
//!         )
//!         .await?;
//!     println!("Assistant: {}", reply.content);
//!
//!     if let Some(usage) = client.get_last_usage() {
//!         println!("Tokens: {} in / {} out", usage.input_tokens, usage.output_tokens);
//!     }
//!     Ok(())
//! }
//! ```

use crate::client_wrapper::{
    ClientError, ClientWrapper, Message, ResponseFormat, Role, TokenUsage,
};
use crate::councilchat::clients::common::{get_http_client, preview};
use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

/// Client for OpenAI compatible chat completion endpoints.
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Client for the official OpenAI endpoint.
    pub fn new(secret_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(secret_key, model_name, DEFAULT_BASE_URL)
    }

    /// Client for any OpenAI compatible endpoint, e.g. `http://localhost:11434/v1`.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        Self {
            api_key: secret_key.to_string(),
            model: model_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: None,
            token_usage: Mutex::new(None),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        format: ResponseFormat,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
            response_format: match format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(WireResponseFormat {
                    kind: "json_object",
                }),
            },
        }
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> Result<Message, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(messages, format);
        debug!(
            "POST {} ({} messages, format {:?})",
            url,
            messages.len(),
            format
        );

        let response = get_http_client(&self.base_url)
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("OpenAI API error {}: {}", status, preview(&text, 500));
            return Err(format!("OpenAI API error {}: {}", status, text).into());
        }

        let parsed: ChatResponse = response.json().await?;
        if let Some(usage) = parsed.usage {
            let mut slot = self
                .token_usage
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = Some(TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or("No choices in OpenAI response")?
            .message
            .content
            .unwrap_or_default();
        Ok(Message::new(Role::Assistant, content))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
