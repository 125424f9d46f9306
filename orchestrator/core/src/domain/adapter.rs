// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Pluggable adapter kinds held by the adapter registry.

use crate::domain::agent::AutonomousAgent;
use crate::domain::llm::LLMProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterCategory {
    Service,
    LlmProvider,
    Tunnel,
    Flow,
}

impl AdapterCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterCategory::Service => "service",
            AdapterCategory::LlmProvider => "llm_provider",
            AdapterCategory::Tunnel => "tunnel",
            AdapterCategory::Flow => "flow",
        }
    }
}

impl fmt::Display for AdapterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterCategory {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "service" => Ok(AdapterCategory::Service),
            "llm_provider" | "llm" | "provider" => Ok(AdapterCategory::LlmProvider),
            "tunnel" => Ok(AdapterCategory::Tunnel),
            "flow" => Ok(AdapterCategory::Flow),
            _ => Err(RegistryError::UnknownCategory(s.to_string())),
        }
    }
}

/// An external service integration (payments, scheduling, ...)
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    async fn health_check(&self) -> anyhow::Result<()>;
}

/// A tunnel exposing a local endpoint publicly
pub trait TunnelAdapter: Send + Sync {
    fn public_url(&self) -> Option<String>;
}

/// A registered implementation, tagged with its category
#[derive(Clone)]
pub enum Adapter {
    Service(Arc<dyn ServiceAdapter>),
    LlmProvider(Arc<dyn LLMProvider>),
    Tunnel(Arc<dyn TunnelAdapter>),
    Flow(Arc<dyn AutonomousAgent>),
}

impl Adapter {
    pub fn category(&self) -> AdapterCategory {
        match self {
            Adapter::Service(_) => AdapterCategory::Service,
            Adapter::LlmProvider(_) => AdapterCategory::LlmProvider,
            Adapter::Tunnel(_) => AdapterCategory::Tunnel,
            Adapter::Flow(_) => AdapterCategory::Flow,
        }
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Adapter::{}", self.category())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown adapter category: '{0}'")]
    UnknownCategory(String),

    #[error("Adapter category mismatch: registering a {actual} adapter under {expected}")]
    CategoryMismatch {
        expected: AdapterCategory,
        actual: AdapterCategory,
    },
}
