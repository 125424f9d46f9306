// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Process bootstrap - builds the shared registry, event bus, router and
// orchestrator from a loaded configuration.

use crate::application::chat_orchestrator::ChatOrchestrator;
use crate::application::router::LlmRouter;
use crate::domain::router_config::RouterConfigSpec;
use crate::infrastructure::agent_client::HttpAutonomousAgent;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::register_providers;
use crate::infrastructure::registry::AdapterRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub struct RouterServices {
    pub registry: Arc<AdapterRegistry>,
    pub events: EventBus,
    pub router: Arc<LlmRouter>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl RouterServices {
    /// Fails fast on missing credentials or malformed provider settings
    pub fn from_config(spec: &RouterConfigSpec) -> Result<Self> {
        Self::with_registry(spec, Arc::new(AdapterRegistry::new()))
    }

    /// Wire services around a registry that may already hold adapters
    pub fn with_registry(spec: &RouterConfigSpec, registry: Arc<AdapterRegistry>) -> Result<Self> {
        let providers =
            register_providers(spec, &registry).context("Failed to initialize LLM providers")?;

        if let Some(endpoint) = &spec.orchestrator.agent_endpoint {
            info!(flow = %spec.orchestrator.agent_flow, endpoint = %endpoint, "Registering autonomous agent");
            registry.register_flow(
                spec.orchestrator.agent_flow.clone(),
                Arc::new(HttpAutonomousAgent::new(endpoint.clone())),
            );
        }

        let events = EventBus::new(spec.router.event_capacity);
        let router = Arc::new(
            LlmRouter::new(registry.clone(), spec.task_routing.clone(), events.clone())
                .with_failure_threshold(spec.router.failure_threshold),
        );
        let orchestrator = Arc::new(
            ChatOrchestrator::new(router.clone(), registry.clone())
                .with_agent_flow(spec.orchestrator.agent_flow.clone()),
        );

        info!(providers = providers.len(), "Router services ready");

        Ok(Self {
            registry,
            events,
            router,
            orchestrator,
        })
    }
}
