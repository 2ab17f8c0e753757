//! AI completion provider abstraction and chat-completions implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Text-completion collaborator used by the summarization pipeline.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    async fn generate_completion(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Provider speaking the OpenAI-compatible chat-completions protocol.
pub struct ChatCompletionProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatCompletionProvider {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build completion HTTP client")?;

        info!("Initialized completion provider with base URL: {}", base_url);

        Ok(Self {
            client,
            api_key,
            base_url,
            model,
        })
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionProvider {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_completion(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            anyhow::bail!("No completion API key configured");
        }

        let url = format!("{}/chat/completions", self.base_url);

        // The trailing assistant message seeds the reply with an opening
        // brace; the brace is re-attached to the completion below.
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
                ChatMessage {
                    role: "assistant",
                    content: "{",
                },
            ],
            temperature: 0.2,
        };

        debug!("Submitting completion request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send completion request")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read completion response body")?;

        if !status.is_success() {
            error!(
                "Completion request failed with status {}: {}",
                status, response_text
            );
            anyhow::bail!(
                "Completion request failed with status {}: {}",
                status,
                response_text
            );
        }

        let chat: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse completion response")?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Completion response contained no choices")?;

        debug!("Completion received: {} chars", content.len());
        Ok(format!("{{{}", content))
    }
}
