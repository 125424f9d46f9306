// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between the domain `LLMProvider` interface
// and one vendor's wire protocol.

pub mod anthropic;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod stream;

pub use factory::{create_provider, register_providers};

use crate::domain::llm::LLMError;
use std::time::Duration;

/// Client for one adapter. `timeout` bounds connecting and every idle gap
/// while reading a body, so a stream that keeps producing is never cut off.
/// Blocking calls add `timeout` as a whole-request limit on top.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, LLMError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|e| LLMError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
