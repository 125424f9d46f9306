// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Router Configuration Types
//
// Defines the configuration schema for an AEGIS router node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - LLM provider credentials and endpoints (BYOLLM support)
// - Task-to-provider priority chains
// - Health tracking and orchestration settings
// - Logging and metrics settings

use crate::domain::routing::TaskRouting;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "RouterConfig";

/// Top-level Kubernetes-style router configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RouterConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: RouterConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfigSpec {
    #[serde(default)]
    pub llm_providers: Vec<LLMProviderConfig>,

    /// Ordered provider chain per task type
    #[serde(default)]
    pub task_routing: TaskRouting,

    #[serde(default)]
    pub router: RouterSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    /// LM Studio, vLLM and friends
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
}

impl ProviderKind {
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderKind::OpenAI | ProviderKind::Anthropic)
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAICompatible => "http://localhost:1234/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAICompatible => "openai-compatible",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name referenced by task_routing (e.g., "ollama-local")
    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderKind,

    /// API endpoint URL; defaults per provider type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model when a route does not override it
    pub model: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-request timeout for this provider
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LLMProviderConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider_type.default_endpoint())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Consecutive failed attempts before a provider is marked unavailable.
    /// 0 disables automatic demotion.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Event bus buffer size
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Registry flow name of the autonomous agent
    #[serde(default = "default_agent_flow")]
    pub agent_flow: String,

    /// HTTP endpoint of the autonomous agent, registered under `agent_flow`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_endpoint: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            agent_flow: default_agent_flow(),
            agent_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_event_capacity() -> usize {
    1000
}

fn default_agent_flow() -> String {
    "autonomous_agent".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for RouterConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "aegis-router".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: RouterConfigSpec::default(),
        }
    }
}

impl RouterConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AEGIS_ROUTER_CONFIG_PATH environment variable
    /// 2. ./aegis-router.yaml (working directory)
    /// 3. ~/.aegis/router.yaml (user home)
    /// 4. /etc/aegis/router.yaml (system, Unix) or C:\ProgramData\Aegis\router.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AEGIS_ROUTER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./aegis-router.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aegis").join("router.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/aegis/router.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Aegis\\router.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!(
                "No configuration file found in standard locations. Using empty defaults."
            );
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AEGIS_ROUTER_FAILURE_THRESHOLD") {
            match val.trim().parse::<u32>() {
                Ok(threshold) => {
                    tracing::info!(
                        "Environment override: AEGIS_ROUTER_FAILURE_THRESHOLD={}",
                        threshold
                    );
                    self.spec.router.failure_threshold = threshold;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for AEGIS_ROUTER_FAILURE_THRESHOLD: '{}'. Expected an integer. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(endpoint) = std::env::var("AEGIS_ROUTER_AGENT_ENDPOINT") {
            if !endpoint.is_empty() {
                tracing::info!("Environment override: AEGIS_ROUTER_AGENT_ENDPOINT={}", endpoint);
                self.spec.orchestrator.agent_endpoint = Some(endpoint);
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = std::collections::HashSet::new();
        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }

            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate LLM provider name: {}", provider.name);
            }

            if provider.endpoint.as_deref().is_some_and(str::is_empty) {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.model.is_empty() {
                anyhow::bail!("LLM provider must declare a model: {}", provider.name);
            }

            if provider.enabled
                && provider.provider_type.requires_api_key()
                && provider.api_key.is_none()
            {
                anyhow::bail!(
                    "LLM provider '{}' of type {} requires an api_key",
                    provider.name,
                    provider.provider_type
                );
            }
        }

        for (task_type, chain) in self.spec.task_routing.iter() {
            for route in chain {
                if !self.spec.llm_providers.iter().any(|p| p.name == route.provider) {
                    anyhow::bail!(
                        "task_routing.{} references unknown provider '{}'",
                        task_type,
                        route.provider
                    );
                }
            }
        }

        if self.spec.orchestrator.agent_flow.is_empty() {
            anyhow::bail!("orchestrator.agent_flow cannot be empty");
        }

        Ok(())
    }
}
