// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Factory - builds adapters from configuration
//
// Credentials are resolved exactly once, here. A missing credential aborts
// startup instead of surfacing later as a provider failure.

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;
use crate::domain::llm::{LLMError, LLMProvider};
use crate::domain::router_config::{LLMProviderConfig, ProviderKind, RouterConfigSpec};
use crate::infrastructure::registry::AdapterRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Create a provider instance from configuration
pub fn create_provider(config: &LLMProviderConfig) -> Result<Arc<dyn LLMProvider>, LLMError> {
    let api_key = resolve_api_key(&config.api_key)?;
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let endpoint = config.endpoint();

    let provider: Arc<dyn LLMProvider> = match config.provider_type {
        ProviderKind::OpenAI => {
            if api_key.is_none() {
                return Err(LLMError::Configuration(format!(
                    "Provider '{}' requires an api_key",
                    config.name
                )));
            }
            Arc::new(OpenAIAdapter::new(endpoint, api_key, &config.model, timeout)?)
        }
        // Self-hosted servers usually run without auth
        ProviderKind::OpenAICompatible => {
            Arc::new(OpenAIAdapter::new(endpoint, api_key, &config.model, timeout)?)
        }
        ProviderKind::Anthropic => {
            Arc::new(AnthropicAdapter::new(endpoint, api_key, &config.model, timeout)?)
        }
        ProviderKind::Ollama => Arc::new(OllamaAdapter::new(endpoint, &config.model, timeout)?),
    };

    Ok(provider)
}

/// Resolve API key from config (supports "env:VAR_NAME" syntax)
pub fn resolve_api_key(key: &Option<String>) -> Result<Option<String>, LLMError> {
    match key {
        Some(k) => match k.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name).map(Some).map_err(|_| {
                LLMError::Configuration(format!("Environment variable not set: {}", var_name))
            }),
            None => Ok(Some(k.clone())),
        },
        None => Ok(None),
    }
}

/// Build every enabled provider and register it under its configured name.
/// Returns the registered names in configuration order.
pub fn register_providers(
    spec: &RouterConfigSpec,
    registry: &AdapterRegistry,
) -> Result<Vec<String>, LLMError> {
    info!("Initializing LLM providers");

    let mut registered = Vec::new();
    for provider_config in &spec.llm_providers {
        if !provider_config.enabled {
            info!("Provider '{}' disabled, skipping", provider_config.name);
            continue;
        }

        let provider = create_provider(provider_config).map_err(|e| match e {
            LLMError::Configuration(msg) => {
                LLMError::Configuration(format!("{}: {}", provider_config.name, msg))
            }
            other => other,
        })?;

        info!(
            provider = %provider_config.name,
            kind = %provider_config.provider_type,
            model = %provider_config.model,
            "Registered LLM provider"
        );
        registry.register_provider(provider_config.name.clone(), provider);
        registered.push(provider_config.name.clone());
    }

    if registered.is_empty() {
        tracing::warn!("No LLM providers configured - direct chat turns will fail");
    }

    Ok(registered)
}
