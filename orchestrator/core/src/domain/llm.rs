// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider-agnostic LLM types and the capability interface every backend
//! implements.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer between routing logic and vendor APIs

// Concrete adapters live in infrastructure/llm/. The router only ever sees
// `LLMProvider` trait objects looked up by name in the adapter registry.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

/// Closed classification of an invocation. Drives which providers are
/// eligible and in which order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SimpleText,
    CodeGeneration,
    Multimodal,
    ComplexReasoning,
    ImageGeneration,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::SimpleText,
        TaskType::CodeGeneration,
        TaskType::Multimodal,
        TaskType::ComplexReasoning,
        TaskType::ImageGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SimpleText => "simple_text",
            TaskType::CodeGeneration => "code_generation",
            TaskType::Multimodal => "multimodal",
            TaskType::ComplexReasoning => "complex_reasoning",
            TaskType::ImageGeneration => "image_generation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = LLMError;

    /// Accepts both `snake_case` and `kebab-case` spellings. Anything else is
    /// rejected rather than mapped to a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LLMError::InvalidInput(format!("Unknown task type: '{}'", s)))
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One entry of the normalized chat history handed to every provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Output of a single blocking `chat` call
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Generated text
    pub content: String,

    /// Total tokens reported by the provider, 0 when unknown
    pub tokens_used: u32,

    /// Concrete model that served the call, when the provider reports it
    pub model: Option<String>,
}

/// Item produced by a provider stream.
///
/// `Done` is the explicit end marker. A provider stream that runs dry without
/// yielding `Done` was cut off by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Delta(String),
    Done,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LLMError>> + Send>>;

/// Result of a completed router invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    pub provider: String,
    pub content: String,
    pub tokens_used: u32,
    pub latency_ms: u64,
    pub fallback_used: bool,
    pub task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Domain interface for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Run a chat completion and wait for the full response
    async fn chat(&self, messages: &[Message], model: Option<&str>) -> Result<Completion, LLMError>;

    /// Open a streaming chat completion.
    ///
    /// Every call starts a fresh upstream request. Dropping the returned
    /// stream aborts it.
    async fn chat_stream(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<ChunkStream, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Errors that can occur during LLM operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LLMError {
    /// Missing credential or model identifier. Never counted against a
    /// provider's health and never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A single unparseable stream fragment. Adapters log and drop these.
    #[error("Malformed stream fragment: {0}")]
    MalformedFragment(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LLMError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, LLMError::Configuration(_))
    }

    /// Map a reqwest transport error onto the provider error kinds
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout(err.to_string())
        } else if err.is_decode() {
            LLMError::MalformedPayload(err.to_string())
        } else {
            LLMError::Network(err.to_string())
        }
    }

    /// Map a non-2xx status onto the provider error kinds
    pub fn from_status(status: reqwest::StatusCode, body: String, model: &str) -> Self {
        match status.as_u16() {
            401 | 403 => LLMError::Authentication(body),
            404 => LLMError::ModelNotFound(model.to_string()),
            429 => LLMError::RateLimit,
            code => LLMError::Http { status: code, body },
        }
    }
}
