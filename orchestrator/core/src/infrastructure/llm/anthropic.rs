// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic LLM Provider Adapter
//
// Anti-Corruption Layer for Anthropic Claude API

use super::stream::{decode_lines, sse_data, LineDecoder};
use crate::domain::llm::{
    ChunkStream, Completion, LLMError, LLMProvider, Message, MessageRole, StreamChunk,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    timeout: Duration,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta { delta: AnthropicDelta },
    MessageStop,
    Error { error: AnthropicStreamError },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicStreamError {
    message: String,
}

impl AnthropicAdapter {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
            LLMError::Configuration("Anthropic adapter requires an API key".into())
        })?;
        let model = model.into();
        if model.is_empty() {
            return Err(LLMError::Configuration("Anthropic adapter requires a model".into()));
        }

        let client = super::http_client(timeout)?;

        Ok(Self {
            client,
            timeout,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn request(&self, messages: &[Message], model: &str, stream: bool) -> reqwest::RequestBuilder {
        // Anthropic takes system prompts out of band
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let body = AnthropicRequest {
            model,
            messages: messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(|m| AnthropicMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            stream,
        };

        self.client
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        model: &str,
    ) -> Result<reqwest::Response, LLMError> {
        let response = request.send().await.map_err(LLMError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text, model));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for AnthropicAdapter {
    async fn chat(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<Completion, LLMError> {
        let model = model.unwrap_or(&self.model);
        let request = self.request(messages, model, false).timeout(self.timeout);
        let response = self.send(request, model).await?;

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LLMError::MalformedPayload(format!("Failed to parse response: {}", e)))?;

        let content: String = anthropic_response
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect();

        Ok(Completion {
            content,
            tokens_used: anthropic_response
                .usage
                .map(|u| u.input_tokens + u.output_tokens)
                .unwrap_or(0),
            model: Some(anthropic_response.model.unwrap_or_else(|| model.to_string())),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<ChunkStream, LLMError> {
        let model = model.unwrap_or(&self.model);
        let response = self.send(self.request(messages, model, true), model).await?;

        let bytes = response.bytes_stream().map_err(LLMError::from_transport);
        Ok(decode_lines(bytes, AnthropicSseDecoder))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.endpoint))
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(LLMError::from_transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::from_status(response.status(), String::new(), &self.model))
        }
    }
}

struct AnthropicSseDecoder;

impl LineDecoder for AnthropicSseDecoder {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<StreamChunk>, LLMError> {
        // `event:` lines duplicate the `type` field of the data payload
        let Some(data) = sse_data(line) else {
            return Ok(None);
        };

        let event: AnthropicStreamEvent = serde_json::from_str(data)
            .map_err(|e| LLMError::MalformedFragment(e.to_string()))?;

        match event {
            AnthropicStreamEvent::ContentBlockDelta { delta } => {
                Ok(delta.text.map(StreamChunk::Delta))
            }
            AnthropicStreamEvent::MessageStop => Ok(Some(StreamChunk::Done)),
            AnthropicStreamEvent::Error { error } => Err(LLMError::Network(error.message)),
            AnthropicStreamEvent::Other => Ok(None),
        }
    }
}
