// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Adapter Registry - named lookup of pluggable implementations
//
// Constructed once at bootstrap and shared as Arc<AdapterRegistry> with the
// router and the chat orchestrator. Last writer wins on name collisions.

use crate::domain::adapter::{Adapter, AdapterCategory, RegistryError};
use crate::domain::agent::AutonomousAgent;
use crate::domain::llm::LLMProvider;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
pub struct AdapterRegistry {
    entries: DashMap<(AdapterCategory, String), Adapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an adapter under `(category, name)`, replacing any previous one.
    ///
    /// Fails only when the adapter does not belong to `category`.
    pub fn register(
        &self,
        category: AdapterCategory,
        name: impl Into<String>,
        adapter: Adapter,
    ) -> Result<(), RegistryError> {
        if adapter.category() != category {
            return Err(RegistryError::CategoryMismatch {
                expected: category,
                actual: adapter.category(),
            });
        }

        let name = name.into();
        if self.entries.insert((category, name.clone()), adapter).is_some() {
            info!(category = %category, name = %name, "Replaced registered adapter");
        } else {
            debug!(category = %category, name = %name, "Registered adapter");
        }
        Ok(())
    }

    pub fn get(&self, category: AdapterCategory, name: &str) -> Option<Adapter> {
        self.entries
            .get(&(category, name.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Registered names in a category, sorted
    pub fn list(&self, category: AdapterCategory) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == category)
            .map(|entry| entry.key().1.clone())
            .collect();
        names.sort();
        names
    }

    pub fn unregister(&self, category: AdapterCategory, name: &str) -> Option<Adapter> {
        self.entries
            .remove(&(category, name.to_string()))
            .map(|(_, adapter)| adapter)
    }

    pub fn register_provider(&self, name: impl Into<String>, provider: Arc<dyn LLMProvider>) {
        self.entries
            .insert((AdapterCategory::LlmProvider, name.into()), Adapter::LlmProvider(provider));
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn LLMProvider>> {
        match self.get(AdapterCategory::LlmProvider, name)? {
            Adapter::LlmProvider(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn register_flow(&self, name: impl Into<String>, agent: Arc<dyn AutonomousAgent>) {
        self.entries
            .insert((AdapterCategory::Flow, name.into()), Adapter::Flow(agent));
    }

    pub fn flow(&self, name: &str) -> Option<Arc<dyn AutonomousAgent>> {
        match self.get(AdapterCategory::Flow, name)? {
            Adapter::Flow(agent) => Some(agent),
            _ => None,
        }
    }
}
