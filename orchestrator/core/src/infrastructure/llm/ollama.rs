// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments with local LLMs

use super::stream::{decode_lines, LineDecoder};
use crate::domain::llm::{ChunkStream, Completion, LLMError, LLMProvider, Message, StreamChunk};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OllamaAdapter {
    client: reqwest::Client,
    timeout: Duration,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Shape of both the blocking response and every NDJSON stream line
#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    model: Option<String>,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaAdapter {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let model = model.into();
        if model.is_empty() {
            return Err(LLMError::Configuration("Ollama adapter requires a model".into()));
        }

        let client = super::http_client(timeout)?;

        Ok(Self {
            client,
            timeout,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn send(
        &self,
        messages: &[Message],
        model: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LLMError> {
        let request = OllamaRequest {
            model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream,
        };

        let mut builder = self.client.post(format!("{}/api/chat", self.endpoint)).json(&request);
        if !stream {
            builder = builder.timeout(self.timeout);
        }
        let response = builder.send().await.map_err(LLMError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text, model));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn chat(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<Completion, LLMError> {
        let model = model.unwrap_or(&self.model);
        let response = self.send(messages, model, false).await?;

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::MalformedPayload(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = ollama_response.error {
            return Err(LLMError::Http {
                status: 500,
                body: error,
            });
        }

        Ok(Completion {
            content: ollama_response.message.map(|m| m.content).unwrap_or_default(),
            tokens_used: ollama_response.prompt_eval_count.unwrap_or(0)
                + ollama_response.eval_count.unwrap_or(0),
            model: Some(ollama_response.model.unwrap_or_else(|| model.to_string())),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<ChunkStream, LLMError> {
        let model = model.unwrap_or(&self.model);
        let response = self.send(messages, model, true).await?;

        let bytes = response.bytes_stream().map_err(LLMError::from_transport);
        Ok(decode_lines(bytes, OllamaNdjsonDecoder))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Check if Ollama server is running by listing models
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(self.timeout)
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

struct OllamaNdjsonDecoder;

impl LineDecoder for OllamaNdjsonDecoder {
    fn provider(&self) -> &'static str {
        "ollama"
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<StreamChunk>, LLMError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let chunk: OllamaChatResponse = serde_json::from_str(line)
            .map_err(|e| LLMError::MalformedFragment(e.to_string()))?;

        if let Some(error) = chunk.error {
            return Err(LLMError::Http {
                status: 500,
                body: error,
            });
        }
        // Ollama's final line only carries stats and an empty message
        if chunk.done {
            return Ok(Some(StreamChunk::Done));
        }
        Ok(chunk.message.map(|m| StreamChunk::Delta(m.content)))
    }
}
